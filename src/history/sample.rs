use crate::models::WaterQualityRecord;

const SAMPLE_DATE: &str = "2025-10-15";

/// (temperature °C, turbidity NTU, salinity ppt)
const SAMPLE_VALUES: [(f64, f64, f64); 7] = [
    (28.5, 4.2, 0.1),
    (28.7, 4.5, 0.3),
    (29.0, 4.1, 0.2),
    (28.8, 5.0, 0.2),
    (29.1, 4.8, 0.15),
    (29.2, 5.2, 0.3),
    (28.9, 4.9, 0.17),
];

/// Demonstration data set for a station with no history yet.
pub fn sample_records() -> Vec<WaterQualityRecord> {
    SAMPLE_VALUES
        .iter()
        .enumerate()
        .map(|(index, &(temperature, turbidity, salinity))| WaterQualityRecord {
            id: (index + 1).to_string(),
            timestamp: SAMPLE_DATE.to_string(),
            temperature,
            turbidity,
            salinity,
        })
        .collect()
}
