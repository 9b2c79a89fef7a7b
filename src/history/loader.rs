use anyhow::{Context, Result};

use crate::{db::Database, models::WaterQualityRecord};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Up to `limit` most recent history records, oldest first.
///
/// Never fails: a store error is logged and reads as an empty history.
pub async fn load_history(db: &Database, limit: usize) -> Vec<WaterQualityRecord> {
    match try_load_history(db, limit).await {
        Ok(records) => {
            log_info!("loaded {} history record(s)", records.len());
            records
        }
        Err(err) => {
            log_warn!("history load failed, showing no data: {err:?}");
            Vec::new()
        }
    }
}

/// Same as [`load_history`] but lets the caller see the failure.
pub async fn try_load_history(db: &Database, limit: usize) -> Result<Vec<WaterQualityRecord>> {
    let items = db
        .fetch_recent_history(limit)
        .await
        .context("failed to fetch history")?;

    Ok(items.iter().map(|item| item.normalize()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;
    use crate::models::HistoryEntry;

    async fn seed(db: &Database, count: usize) {
        for i in 0..count {
            db.append_history(&HistoryEntry {
                id: Some(format!("r{i}")),
                timestamp: "2025-10-15".into(),
                temperature: 28.0 + i as f64 / 10.0,
                turbidity: 4.0,
                salinity: 0.2,
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn returns_the_most_recent_records_in_order() {
        let (_dir, db) = temp_database();
        seed(&db, 8).await;

        let records = load_history(&db, 5).await;
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r3", "r4", "r5", "r6", "r7"]);
    }

    #[tokio::test]
    async fn limit_above_store_size_returns_everything() {
        let (_dir, db) = temp_database();
        seed(&db, 3).await;
        assert_eq!(load_history(&db, 50).await.len(), 3);
    }

    #[tokio::test]
    async fn empty_store_is_an_empty_history() {
        let (_dir, db) = temp_database();
        assert!(load_history(&db, 10).await.is_empty());
        assert!(try_load_history(&db, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_reads_as_empty() {
        let (_dir, db) = temp_database();
        seed(&db, 2).await;
        db.execute(|conn| {
            conn.execute_batch("DROP TABLE history")?;
            Ok(())
        })
        .await
        .unwrap();

        assert!(load_history(&db, 10).await.is_empty());
        assert!(try_load_history(&db, 10).await.is_err());
    }
}
