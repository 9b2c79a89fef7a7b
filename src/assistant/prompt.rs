//! Prompt text for the water-quality advisor.
//!
//! The advisor serves operators in Vĩnh Long province, so every user-facing
//! string is Vietnamese.

use anyhow::Result;

use crate::{dashboard::DashboardSummary, models::WaterQualityRecord};

pub const SYSTEM_INSTRUCTION: &str = "Bạn là trợ lý AI chuyên về giám sát chất lượng nước tại tỉnh Vĩnh Long, Việt Nam. \
Bạn phân tích số liệu nhiệt độ, độ đục và độ mặn được cung cấp, từ đó đưa ra phân tích, cảnh báo, dự đoán và khuyến nghị hữu ích. \
Luôn trả lời bằng tiếng Việt, rõ ràng và chuyên nghiệp. \
Khi được yêu cầu dự đoán mà không nêu khoảng thời gian, hãy dự đoán cho 1 tuần, 1 tháng và 1 năm.";

pub const NOT_CONFIGURED_MESSAGE: &str = "Chức năng AI chưa được cấu hình. Vui lòng đặt biến môi trường GEMINI_API_KEY để sử dụng tính năng này.";

pub const APOLOGY_MESSAGE: &str =
    "Rất tiếc, đã có lỗi xảy ra khi kết nối với AI. Vui lòng thử lại sau.";

pub const CHAT_ERROR_MESSAGE: &str = "Xin lỗi, đã có lỗi xảy ra. Vui lòng thử lại.";

pub const GREETING: &str = "Xin chào, tôi là trợ lý AI giám sát chất lượng nước.\n\
Tôi có thể giúp bạn:\n\
- Phân tích và dự đoán xu hướng chất lượng nước\n\
- Cảnh báo nhiễm mặn và các vấn đề khác\n\
- Tư vấn về độ mặn, độ đục, độ dẫn điện\n\
- Đưa ra khuyến nghị xử lý\n\
Hãy hỏi tôi bất cứ điều gì về chất lượng nước tại tỉnh Vĩnh Long!";

pub const SUGGESTED_PROMPTS: [&str; 4] = [
    "Dự đoán độ mặn dựa vào độ mặn đo được mới nhất",
    "Độ mặn hiện tại",
    "Nguy cơ nhiễm mặn",
    "Dự đoán độ mặn trong 1 tuần tới",
];

const NO_DATA: &str = "Hiện không có dữ liệu lịch sử.";

/// Compact description of `records`: count, the last `recent` records as
/// JSON, and per-metric averages.
pub fn data_summary(records: &[WaterQualityRecord], recent: usize) -> Result<String> {
    let summary = DashboardSummary::from_records(records);
    let (Some(temperature), Some(turbidity), Some(salinity)) =
        (summary.temperature, summary.turbidity, summary.salinity)
    else {
        return Ok(NO_DATA.to_string());
    };

    let tail = &records[records.len().saturating_sub(recent)..];
    let tail_json = serde_json::to_string_pretty(tail)?;

    Ok(format!(
        "Có {count} bản ghi dữ liệu chất lượng nước.\n\n\
         Dữ liệu gần nhất:\n{tail_json}\n\n\
         Tóm tắt:\n\
         - Nhiệt độ: Trung bình {t:.1}°C\n\
         - Độ đục: Trung bình {u:.1} NTU\n\
         - Độ mặn: Trung bình {s:.1} ppt",
        count = summary.count,
        t = temperature.average,
        u = turbidity.average,
        s = salinity.average,
    ))
}

pub fn build_prompt(
    user_prompt: &str,
    records: &[WaterQualityRecord],
    recent: usize,
) -> Result<String> {
    let data = data_summary(records, recent)?;

    Ok(format!(
        "Dưới đây là dữ liệu chất lượng nước từ hệ thống giám sát:\n\
         {data}\n\n\
         Yêu cầu của người dùng: \"{user_prompt}\"\n\n\
         Hãy phân tích chi tiết và trả lời yêu cầu này dựa trên dữ liệu thực tế đã thu thập."
    ))
}
