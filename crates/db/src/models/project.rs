use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Lifecycle of a project: a plan is generated while `Planning`, code is
/// generated while `Building`, and the generated file set marks it `Completed`.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "project_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Building,
    Completed,
}

/// Technical plan produced by the AI for a project
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
pub struct ProjectPlan {
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub file_structure: Vec<String>,
    #[serde(default)]
    pub database_schema: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub deployment_strategy: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub plan: Option<String>, // JSON-serialized ProjectPlan
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub description: String,
}

/// Project as returned over the API, with its plan decoded
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub plan: Option<ProjectPlan>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        let plan = project.parsed_plan();
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            plan,
            status: project.status,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

const PROJECT_COLUMNS: &str =
    "id, user_id, name, description, plan, status, created_at, updated_at";

impl Project {
    /// Parse the stored plan JSON into a ProjectPlan
    pub fn parsed_plan(&self) -> Option<ProjectPlan> {
        self.plan
            .as_ref()
            .and_then(|json| serde_json::from_str(json).ok())
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        user_id: &str,
        data: &CreateProject,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            r#"INSERT INTO projects (id, user_id, name, description, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {PROJECT_COLUMNS}"#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(ProjectStatus::Planning)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Look up a project only if it belongs to `user_id`
    pub async fn find_owned(
        pool: &SqlitePool,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update_plan(
        pool: &SqlitePool,
        id: Uuid,
        plan: &ProjectPlan,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let json = serde_json::to_string(plan).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        sqlx::query("UPDATE projects SET plan = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(json)
            .bind(now)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_status<'e, E>(
        executor: E,
        id: Uuid,
        status: ProjectStatus,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE projects SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_matches_the_stored_form() {
        assert_eq!(ProjectStatus::Completed.to_string(), "completed");
        assert_eq!("building".parse::<ProjectStatus>().unwrap(), ProjectStatus::Building);
        assert!("done".parse::<ProjectStatus>().is_err());
    }
}
