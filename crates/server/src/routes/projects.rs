use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use chrono::Utc;
use db::models::{
    deployment::Deployment,
    project::{CreateProject, Project, ProjectResponse},
    project_file::ProjectFile,
    user::User,
};
use serde::{Deserialize, Serialize};
use services::services::{
    archive::{archive_file_name, project_archive},
    project_builder::BuildOutcome,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, PROFILE_MISSING},
    state::AppState,
};

const MAX_NAME_LEN: usize = 120;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectDetail {
    pub project: ProjectResponse,
    pub files: Vec<ProjectFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct GeneratePlanRequest {
    #[serde(default)]
    pub prompt: String,
}

async fn owned_project(state: &AppState, id: Uuid, user_id: &str) -> Result<Project, ApiError> {
    Project::find_owned(state.pool(), id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    axum::Json(payload): axum::Json<CreateProject>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ProjectResponse>>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Project name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "Project name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    if User::find_by_id(state.pool(), &auth.user_id).await?.is_none() {
        return Err(ApiError::NotFound(PROFILE_MISSING.to_string()));
    }

    let data = CreateProject {
        name: name.to_string(),
        description: payload.description.trim().to_string(),
    };
    let project = Project::create(state.pool(), Uuid::new_v4(), &auth.user_id, &data, Utc::now()).await?;
    tracing::info!(project_id = %project.id, user_id = %auth.user_id, "Project created");
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(project.into())),
    ))
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectResponse>>>, ApiError> {
    let projects = Project::find_by_user_id(state.pool(), &auth.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(
        projects.into_iter().map(ProjectResponse::from).collect(),
    )))
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProjectDetail>>, ApiError> {
    let project = owned_project(&state, id, &auth.user_id).await?;
    let files = ProjectFile::find_by_project_id(state.pool(), id).await?;
    Ok(ResponseJson(ApiResponse::success(ProjectDetail {
        project: project.into(),
        files,
    })))
}

/// POST /api/projects/{id}/plan
pub async fn generate_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<GeneratePlanRequest>,
) -> Result<ResponseJson<ApiResponse<ProjectResponse>>, ApiError> {
    let (project, _plan) = state
        .planner()
        .generate_plan(id, &auth.user_id, payload.prompt.trim(), Utc::now())
        .await?;
    Ok(ResponseJson(ApiResponse::success(project.into())))
}

/// POST /api/projects/{id}/build
pub async fn build_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<BuildOutcome>>, ApiError> {
    let outcome = state.builder().build(id, &auth.user_id, Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

/// GET /api/projects/{id}/download
/// Generated files as a gzip tarball
pub async fn download_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let project = owned_project(&state, id, &auth.user_id).await?;
    let files = ProjectFile::find_by_project_id(state.pool(), id).await?;
    if files.is_empty() {
        return Err(ApiError::NotFound("Project has no generated files".to_string()));
    }

    let file_name = archive_file_name(&project.name);
    let root = file_name.trim_end_matches(".tar.gz").to_string();
    let bytes = project_archive(&root, &files).map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// POST /api/projects/{id}/deploy
pub async fn deploy_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Deployment>>, ApiError> {
    let deployment = state.deployments().deploy(id, &auth.user_id, Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(deployment)))
}

/// GET /api/projects/{id}/deployments
pub async fn list_deployments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Deployment>>>, ApiError> {
    let deployments = state.deployments().history(id, &auth.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(deployments)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_project).get(list_projects))
        .route("/{id}", get(get_project))
        .route("/{id}/plan", post(generate_plan))
        .route("/{id}/build", post(build_project))
        .route("/{id}/download", get(download_project))
        .route("/{id}/deploy", post(deploy_project))
        .route("/{id}/deployments", get(list_deployments))
}
