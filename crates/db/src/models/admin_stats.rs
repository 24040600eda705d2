use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;

const GLOBAL_ID: &str = "global";

/// Running revenue and subscriber totals
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS)]
pub struct AdminStats {
    pub total_revenue: i64, // kobo
    pub active_subscribers: i64,
}

impl AdminStats {
    pub async fn get(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let stats = sqlx::query_as::<_, AdminStats>(
            "SELECT total_revenue, active_subscribers FROM admin_stats WHERE id = $1",
        )
        .bind(GLOBAL_ID)
        .fetch_optional(pool)
        .await?;
        Ok(stats.unwrap_or_default())
    }

    /// Add to the running totals, creating the row on first use
    pub async fn record<'e, E>(
        executor: E,
        revenue: i64,
        subscriber_delta: i64,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"INSERT INTO admin_stats (id, total_revenue, active_subscribers, updated_at)
               VALUES ($1, $2, MAX($3, 0), $4)
               ON CONFLICT(id) DO UPDATE SET
                   total_revenue = total_revenue + excluded.total_revenue,
                   active_subscribers = MAX(active_subscribers + $3, 0),
                   updated_at = excluded.updated_at"#,
        )
        .bind(GLOBAL_ID)
        .bind(revenue)
        .bind(subscriber_delta)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }
}
