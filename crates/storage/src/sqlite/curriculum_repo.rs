use chrono::{DateTime, Utc};
use skill_core::model::Curriculum;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, i64_to_u64, ser};
use crate::repository::{CurriculumRepository, StorageError, StoredCurriculum};

#[async_trait::async_trait]
impl CurriculumRepository for SqliteRepository {
    async fn save_curriculum(
        &self,
        curriculum: &Curriculum,
        saved_at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let document = serde_json::to_string(curriculum).map_err(ser)?;

        let row = sqlx::query(
            r"
            INSERT INTO curriculum (id, title, document, revision, updated_at)
            VALUES (1, ?1, ?2, 1, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                document = excluded.document,
                revision = curriculum.revision + 1,
                updated_at = excluded.updated_at
            RETURNING revision
            ",
        )
        .bind(curriculum.title.clone())
        .bind(document)
        .bind(saved_at)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let revision = i64_to_u64("revision", row.try_get::<i64, _>("revision").map_err(ser)?)?;
        tracing::debug!(revision, title = %curriculum.title, "curriculum saved");
        Ok(revision)
    }

    async fn load_curriculum(&self) -> Result<Option<StoredCurriculum>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT document, revision, updated_at
            FROM curriculum WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row.try_get("document").map_err(ser)?;
        let curriculum: Curriculum = serde_json::from_str(&document).map_err(ser)?;
        Ok(Some(StoredCurriculum {
            curriculum,
            revision: i64_to_u64("revision", row.try_get::<i64, _>("revision").map_err(ser)?)?,
            updated_at: row.try_get("updated_at").map_err(ser)?,
        }))
    }
}
