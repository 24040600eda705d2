use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "deployment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Deployment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: String,
    pub url: Option<String>,
    pub status: DeploymentStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DEPLOYMENT_COLUMNS: &str =
    "id, project_id, user_id, url, status, error, created_at, updated_at";

impl Deployment {
    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Deployment>(&format!(
            r#"INSERT INTO deployments (id, project_id, user_id, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {DEPLOYMENT_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(user_id)
        .bind(DeploymentStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Deployment>(&format!(
            "SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE project_id = $1 ORDER BY created_at DESC"
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn complete(
        pool: &SqlitePool,
        id: Uuid,
        status: DeploymentStatus,
        url: Option<&str>,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Deployment>(&format!(
            r#"UPDATE deployments
               SET status = $2, url = $3, error = $4, updated_at = $5
               WHERE id = $1
               RETURNING {DEPLOYMENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(status)
        .bind(url)
        .bind(error)
        .bind(now)
        .fetch_one(pool)
        .await
    }
}
