use chrono::{DateTime, Utc};
use db::models::{
    deployment::{Deployment, DeploymentStatus},
    project::Project,
    project_file::ProjectFile,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::vercel::{VercelClient, VercelError};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Vercel(#[from] VercelError),
    #[error("project not found")]
    NotFound,
    #[error("project has no generated files to deploy")]
    NoFiles,
}

/// Vercel project name for a stored project
pub fn deployment_name(project_id: Uuid) -> String {
    format!("chibot-project-{}", project_id.simple())
}

pub struct DeploymentService {
    pool: SqlitePool,
    vercel: VercelClient,
}

impl DeploymentService {
    pub fn new(pool: SqlitePool, vercel: VercelClient) -> Self {
        Self { pool, vercel }
    }

    /// Deploy the project's current files, recording the attempt. A failed
    /// upload is stored on the deployment row before the error is returned.
    pub async fn deploy(
        &self,
        project_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Deployment, DeploymentError> {
        if !self.vercel.is_configured() {
            return Err(VercelError::NotConfigured.into());
        }
        Project::find_owned(&self.pool, project_id, user_id)
            .await?
            .ok_or(DeploymentError::NotFound)?;
        let files = ProjectFile::find_by_project_id(&self.pool, project_id).await?;
        if files.is_empty() {
            return Err(DeploymentError::NoFiles);
        }

        let deployment = Deployment::create(&self.pool, project_id, user_id, now).await?;
        let result = self
            .vercel
            .deploy(
                &deployment_name(project_id),
                files.iter().map(|f| (f.path.as_str(), f.content.as_str())),
            )
            .await;

        match result {
            Ok(created) => {
                let url = created.public_url();
                info!(project_id = %project_id, deployment_id = %deployment.id, url = %url, "Project deployed");
                Ok(Deployment::complete(
                    &self.pool,
                    deployment.id,
                    DeploymentStatus::Success,
                    Some(&url),
                    None,
                    Utc::now(),
                )
                .await?)
            }
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "Deployment failed");
                Deployment::complete(
                    &self.pool,
                    deployment.id,
                    DeploymentStatus::Failed,
                    None,
                    Some(&e.to_string()),
                    Utc::now(),
                )
                .await?;
                Err(e.into())
            }
        }
    }

    pub async fn history(
        &self,
        project_id: Uuid,
        user_id: &str,
    ) -> Result<Vec<Deployment>, DeploymentError> {
        Project::find_owned(&self.pool, project_id, user_id)
            .await?
            .ok_or(DeploymentError::NotFound)?;
        Ok(Deployment::find_by_project_id(&self.pool, project_id).await?)
    }
}
