//! Generates a project's source files from its plan.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use db::models::{
    project::{Project, ProjectStatus},
    project_file::{NewProjectFile, ProjectFile},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    ai_client::{AiClient, AiError},
    usage::{DAILY_LIMIT_REASON, UsageError, UsageService},
};

const BUILDER_SYSTEM_PROMPT: &str = r#"You are a senior full-stack developer.
Based on the provided plan, generate the full source code for the application.
Return ONLY a JSON object where keys are file paths and values are file contents.
Example: { "package.json": "{...}", "app/page.tsx": "..." }
Include all necessary configuration files."#;

#[derive(Debug, Error)]
pub enum ProjectBuildError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("ai error: {0}")]
    Ai(#[from] AiError),
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("project not found")]
    NotFound,
    #[error("project has no plan yet")]
    MissingPlan,
    #[error("project is already {0}")]
    InvalidStatus(ProjectStatus),
    #[error("{0}")]
    Denied(String),
    #[error("AI returned no files")]
    EmptyOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BuildOutcome {
    pub project_id: Uuid,
    pub files_written: u64,
    pub tokens_used: i64,
}

pub struct ProjectBuilder {
    pool: SqlitePool,
    ai: AiClient,
}

impl ProjectBuilder {
    pub fn new(pool: SqlitePool, ai: AiClient) -> Self {
        Self { pool, ai }
    }

    pub async fn build(
        &self,
        project_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<BuildOutcome, ProjectBuildError> {
        let project = Project::find_owned(&self.pool, project_id, user_id)
            .await?
            .ok_or(ProjectBuildError::NotFound)?;
        if project.status == ProjectStatus::Completed {
            return Err(ProjectBuildError::InvalidStatus(project.status));
        }

        let check = UsageService::check(&self.pool, user_id, now).await?;
        if !check.allowed {
            return Err(ProjectBuildError::Denied(
                check.reason.unwrap_or_else(|| DAILY_LIMIT_REASON.to_string()),
            ));
        }

        let plan = project.parsed_plan().ok_or(ProjectBuildError::MissingPlan)?;
        Project::update_status(&self.pool, project_id, ProjectStatus::Building, now).await?;

        let plan_json = serde_json::to_string(&plan).map_err(|e| AiError::Serde(e.to_string()))?;
        let completion = match self
            .ai
            .ask_json::<BTreeMap<String, serde_json::Value>>(
                &format!("Plan: {plan_json}"),
                Some(BUILDER_SYSTEM_PROMPT),
            )
            .await
        {
            Ok(completion) => completion,
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "Build generation failed");
                return Err(e.into());
            }
        };

        let files = generated_files(completion.value);
        if files.is_empty() {
            return Err(ProjectBuildError::EmptyOutput);
        }

        let mut tx = self.pool.begin().await?;
        let written = ProjectFile::replace_all(&mut *tx, project_id, &files, now).await?;
        if !UsageService::record_build(&mut tx, user_id, completion.total_tokens, now).await? {
            tx.rollback().await?;
            return Err(ProjectBuildError::Denied(DAILY_LIMIT_REASON.to_string()));
        }
        Project::update_status(&mut *tx, project_id, ProjectStatus::Completed, now).await?;
        tx.commit().await?;

        info!(
            project_id = %project_id,
            files = written,
            tokens = completion.total_tokens,
            "Project built"
        );

        Ok(BuildOutcome {
            project_id,
            files_written: written,
            tokens_used: completion.total_tokens,
        })
    }
}

/// File contents are expected as strings; anything else (a JSON object for
/// `package.json`, say) is stored as pretty-printed JSON.
fn generated_files(map: BTreeMap<String, serde_json::Value>) -> Vec<NewProjectFile> {
    map.into_iter()
        .filter(|(path, _)| !path.trim().is_empty())
        .map(|(path, value)| {
            let content = match value {
                serde_json::Value::String(s) => s,
                other => serde_json::to_string_pretty(&other).unwrap_or_default(),
            };
            NewProjectFile::from_generated(path, content)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            project::{CreateProject, ProjectPlan},
            user::{CreateUser, User},
        },
    };
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    async fn setup(with_plan: bool) -> (SqlitePool, Project) {
        let db = DBService::new_in_memory().await.unwrap();
        let now = Utc::now();
        User::create(
            &db.pool,
            &CreateUser {
                id: "builder".into(),
                email: "builder@example.com".into(),
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
            "builder",
            &CreateProject {
                name: "Shop".into(),
                description: "Storefront".into(),
            },
            now,
        )
        .await
        .unwrap();
        if with_plan {
            let plan = ProjectPlan {
                summary: "a shop".into(),
                ..Default::default()
            };
            Project::update_plan(&db.pool, project.id, &plan, now)
                .await
                .unwrap();
        }
        (db.pool, project)
    }

    fn files_reply() -> serde_json::Value {
        let files = json!({
            "package.json": { "name": "shop" },
            "app/page.tsx": "export default function Page() {}",
            "README": "hello"
        });
        json!({
            "choices": [{ "message": { "content": files.to_string() } }],
            "usage": { "total_tokens": 1500 }
        })
    }

    #[tokio::test]
    async fn build_stores_files_and_counts_usage() {
        let (pool, project) = setup(true).await;
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(files_reply());
            })
            .await;
        let ai = AiClient::new(vec!["k".into()], Some(server.base_url()), None).unwrap();
        let builder = ProjectBuilder::new(pool.clone(), ai);

        let outcome = builder.build(project.id, "builder", Utc::now()).await.unwrap();
        assert_eq!(outcome.files_written, 3);
        assert_eq!(outcome.tokens_used, 1500);

        let files = ProjectFile::find_by_project_id(&pool, project.id).await.unwrap();
        let page = files.iter().find(|f| f.path == "app/page.tsx").unwrap();
        assert_eq!(page.filename, "page.tsx");
        assert_eq!(page.language, "tsx");
        let readme = files.iter().find(|f| f.path == "README").unwrap();
        assert_eq!(readme.language, "text");
        let manifest = files.iter().find(|f| f.path == "package.json").unwrap();
        assert!(manifest.content.contains("\"shop\""));

        let user = User::find_by_id(&pool, "builder").await.unwrap().unwrap();
        assert_eq!(user.daily_builds, 1);
        assert_eq!(user.monthly_tokens, 1500);
        let project = Project::find_by_id(&pool, project.id).await.unwrap().unwrap();
        assert_eq!(project.status, ProjectStatus::Completed);
    }

    #[tokio::test]
    async fn build_without_plan_is_rejected() {
        let (pool, project) = setup(false).await;
        let ai = AiClient::new(vec!["k".into()], Some("http://127.0.0.1:9".into()), None).unwrap();
        let err = ProjectBuilder::new(pool, ai)
            .build(project.id, "builder", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectBuildError::MissingPlan));
    }

    #[tokio::test]
    async fn failed_generation_leaves_project_building() {
        let (pool, project) = setup(true).await;
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503);
            })
            .await;
        let ai = AiClient::new(vec!["k".into()], Some(server.base_url()), None).unwrap();
        let err = ProjectBuilder::new(pool.clone(), ai)
            .build(project.id, "builder", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectBuildError::Ai(AiError::AllKeysFailed)));

        let project = Project::find_by_id(&pool, project.id).await.unwrap().unwrap();
        assert_eq!(project.status, ProjectStatus::Building);
        let user = User::find_by_id(&pool, "builder").await.unwrap().unwrap();
        assert_eq!(user.daily_builds, 0);
    }

    #[tokio::test]
    async fn sixth_free_build_is_denied() {
        let (pool, project) = setup(true).await;
        let now = Utc::now();
        UsageService::refresh(&pool, "builder", now)
            .await
            .unwrap();
        for _ in 0..5 {
            User::try_record_build(&pool, "builder", 0, now).await.unwrap();
        }
        let ai = AiClient::new(vec!["k".into()], Some("http://127.0.0.1:9".into()), None).unwrap();
        let err = ProjectBuilder::new(pool, ai)
            .build(project.id, "builder", now)
            .await
            .unwrap_err();
        match err {
            ProjectBuildError::Denied(reason) => assert_eq!(reason, DAILY_LIMIT_REASON),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn completed_project_is_not_rebuilt() {
        let (pool, project) = setup(true).await;
        Project::update_status(&pool, project.id, ProjectStatus::Completed, Utc::now())
            .await
            .unwrap();
        let ai = AiClient::new(vec!["k".into()], Some("http://127.0.0.1:9".into()), None).unwrap();

        let err = ProjectBuilder::new(pool.clone(), ai)
            .build(project.id, "builder", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectBuildError::InvalidStatus(ProjectStatus::Completed)
        ));

        let project = Project::find_by_id(&pool, project.id).await.unwrap().unwrap();
        assert_eq!(project.status, ProjectStatus::Completed);
        let user = User::find_by_id(&pool, "builder").await.unwrap().unwrap();
        assert_eq!(user.daily_builds, 0);
    }
}
