use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectFile {
    pub id: Uuid,
    pub project_id: Uuid,
    pub filename: String,
    pub path: String,
    pub content: String,
    pub language: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// A generated file before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectFile {
    pub filename: String,
    pub path: String,
    pub content: String,
    pub language: String,
    pub size: i64,
}

impl NewProjectFile {
    /// Derive filename, language and size from a generated `path`/`content` pair.
    pub fn from_generated(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        let filename = path.rsplit('/').next().unwrap_or(&path).to_string();
        let language = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
            .unwrap_or("text")
            .to_string();
        let size = content.len() as i64;
        Self {
            filename,
            path,
            content,
            language,
            size,
        }
    }
}

const FILE_COLUMNS: &str = "id, project_id, filename, path, content, language, size, created_at";

impl ProjectFile {
    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM project_files WHERE project_id = $1 ORDER BY path ASC"
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Replace the whole file set of a project. Meant to run inside a
    /// transaction so a failed build never leaves a partial file set.
    pub async fn replace_all(
        conn: &mut SqliteConnection,
        project_id: Uuid,
        files: &[NewProjectFile],
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query("DELETE FROM project_files WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *conn)
            .await?;

        let mut inserted = 0;
        for file in files {
            sqlx::query(
                r#"INSERT INTO project_files (id, project_id, filename, path, content, language, size, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
            )
            .bind(Uuid::new_v4())
            .bind(project_id)
            .bind(&file.filename)
            .bind(&file.path)
            .bind(&file.content)
            .bind(&file.language)
            .bind(file.size)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            inserted += 1;
        }
        Ok(inserted)
    }
}
