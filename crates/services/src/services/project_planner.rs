//! Turns a project description into a technical plan using the AI client.

use chrono::{DateTime, Utc};
use db::models::project::{Project, ProjectPlan, ProjectStatus};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::ai_client::{AiClient, AiError};

const PLANNER_SYSTEM_PROMPT: &str = r#"You are an expert software architect.
Given a project name and description, create a detailed technical plan.
Return ONLY a JSON object with the following structure:
{
  "tech_stack": ["string"],
  "file_structure": ["string"],
  "database_schema": "string",
  "dependencies": ["string"],
  "deployment_strategy": "string",
  "summary": "string"
}"#;

#[derive(Debug, Error)]
pub enum ProjectPlannerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("ai error: {0}")]
    Ai(#[from] AiError),
    #[error("project not found")]
    NotFound,
    #[error("project is {0}; plans can only be generated while planning")]
    InvalidStatus(ProjectStatus),
}

pub struct ProjectPlanner {
    pool: SqlitePool,
    ai: AiClient,
}

impl ProjectPlanner {
    pub fn new(pool: SqlitePool, ai: AiClient) -> Self {
        Self { pool, ai }
    }

    /// Ask the AI for a plan and store it on the project
    pub async fn generate_plan(
        &self,
        project_id: Uuid,
        user_id: &str,
        prompt: &str,
        now: DateTime<Utc>,
    ) -> Result<(Project, ProjectPlan), ProjectPlannerError> {
        let project = Project::find_owned(&self.pool, project_id, user_id)
            .await?
            .ok_or(ProjectPlannerError::NotFound)?;
        if project.status != ProjectStatus::Planning {
            return Err(ProjectPlannerError::InvalidStatus(project.status));
        }

        let user_prompt = format!(
            "Project Name: {}\nDescription: {}\nUser Request: {}",
            project.name, project.description, prompt
        );
        let completion = self
            .ai
            .ask_json::<ProjectPlan>(&user_prompt, Some(PLANNER_SYSTEM_PROMPT))
            .await?;
        let plan = completion.value;

        Project::update_plan(&self.pool, project_id, &plan, now).await?;
        info!(
            project_id = %project_id,
            tech_stack = plan.tech_stack.len(),
            files = plan.file_structure.len(),
            tokens = completion.total_tokens,
            "Generated project plan"
        );

        let project = Project::find_by_id(&self.pool, project_id)
            .await?
            .ok_or(ProjectPlannerError::NotFound)?;
        Ok((project, plan))
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            project::CreateProject,
            user::{CreateUser, User},
        },
    };
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    async fn setup() -> (SqlitePool, Project) {
        let db = DBService::new_in_memory().await.unwrap();
        let now = Utc::now();
        User::create(
            &db.pool,
            &CreateUser {
                id: "owner".into(),
                email: "owner@example.com".into(),
                phone: None,
                referred_by: None,
            },
            now,
        )
        .await
        .unwrap();
        let project = Project::create(
            &db.pool,
            Uuid::new_v4(),
            "owner",
            &CreateProject {
                name: "Todo".into(),
                description: "A todo app".into(),
            },
            now,
        )
        .await
        .unwrap();
        (db.pool, project)
    }

    fn plan_reply() -> serde_json::Value {
        let plan = json!({
            "tech_stack": ["Next.js", "SQLite"],
            "file_structure": ["app/page.tsx"],
            "database_schema": "todos(id, title)",
            "dependencies": ["next"],
            "deployment_strategy": "Vercel",
            "summary": "A small todo app"
        });
        json!({
            "choices": [{ "message": { "content": plan.to_string() } }],
            "usage": { "total_tokens": 321 }
        })
    }

    #[tokio::test]
    async fn stores_generated_plan() {
        let (pool, project) = setup().await;
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("Project Name: Todo");
                then.status(200).json_body(plan_reply());
            })
            .await;
        let ai = AiClient::new(vec!["k".into()], Some(server.base_url()), None).unwrap();
        let planner = ProjectPlanner::new(pool.clone(), ai);

        let (stored, plan) = planner
            .generate_plan(project.id, "owner", "keep it simple", Utc::now())
            .await
            .unwrap();

        assert_eq!(plan.tech_stack, vec!["Next.js", "SQLite"]);
        assert_eq!(stored.parsed_plan(), Some(plan));
        assert_eq!(stored.status, ProjectStatus::Planning);
    }

    #[tokio::test]
    async fn other_users_project_is_not_found() {
        let (pool, project) = setup().await;
        let ai = AiClient::new(vec!["k".into()], Some("http://127.0.0.1:9".into()), None).unwrap();
        let planner = ProjectPlanner::new(pool, ai);

        let err = planner
            .generate_plan(project.id, "intruder", "x", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectPlannerError::NotFound));
    }

    #[tokio::test]
    async fn completed_project_cannot_be_replanned() {
        let (pool, project) = setup().await;
        Project::update_status(&pool, project.id, ProjectStatus::Completed, Utc::now())
            .await
            .unwrap();
        let ai = AiClient::new(vec!["k".into()], Some("http://127.0.0.1:9".into()), None).unwrap();
        let planner = ProjectPlanner::new(pool, ai);

        let err = planner
            .generate_plan(project.id, "owner", "x", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectPlannerError::InvalidStatus(ProjectStatus::Completed)
        ));
    }
}
