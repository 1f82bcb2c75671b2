use chrono::{DateTime, NaiveDate, Utc};
use skill_core::model::{CompletedSet, TopicId, UserId, UserProgress};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, i64_to_u64, ser, topic_id_from_str, u32_from_i64, u64_to_i64, user_id_to_i64};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(&self, user_id: UserId) -> Result<Option<UserProgress>, StorageError> {
        let uid = user_id_to_i64(user_id)?;

        let row = sqlx::query(
            r"
            SELECT points, level, streak, last_active_on, revision
            FROM user_progress WHERE user_id = ?1
            ",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let ids = sqlx::query("SELECT topic_id FROM completed_topics WHERE user_id = ?1")
            .bind(uid)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut completed = CompletedSet::new();
        for id_row in ids {
            completed.insert(topic_id_from_str(id_row.try_get("topic_id").map_err(ser)?)?);
        }

        let last_active_on: Option<NaiveDate> = row.try_get("last_active_on").map_err(ser)?;
        let progress = UserProgress::from_persisted(
            user_id,
            completed,
            u32_from_i64("points", row.try_get::<i64, _>("points").map_err(ser)?)?,
            u32_from_i64("level", row.try_get::<i64, _>("level").map_err(ser)?)?,
            u32_from_i64("streak", row.try_get::<i64, _>("streak").map_err(ser)?)?,
            last_active_on,
            i64_to_u64("revision", row.try_get::<i64, _>("revision").map_err(ser)?)?,
        )
        .map_err(ser)?;

        Ok(Some(progress))
    }

    async fn save_progress(
        &self,
        progress: &UserProgress,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let uid = user_id_to_i64(progress.user_id())?;
        let revision = u64_to_i64("revision", progress.revision())?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        // only a strictly newer revision replaces the counters
        let res = sqlx::query(
            r"
            INSERT INTO user_progress (user_id, points, level, streak, last_active_on, revision, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                points = excluded.points,
                level = excluded.level,
                streak = excluded.streak,
                last_active_on = excluded.last_active_on,
                revision = excluded.revision,
                updated_at = excluded.updated_at
            WHERE user_progress.revision < excluded.revision
            ",
        )
        .bind(uid)
        .bind(i64::from(progress.points()))
        .bind(i64::from(progress.level()))
        .bind(i64::from(progress.streak()))
        .bind(progress.last_active_on())
        .bind(revision)
        .bind(saved_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            tx.rollback().await.map_err(conn)?;
            if self.load_progress(progress.user_id()).await?.as_ref() == Some(progress) {
                tracing::debug!(user_id = %progress.user_id(), revision, "progress already stored");
                return Ok(());
            }
            tracing::warn!(user_id = %progress.user_id(), revision, "stale progress write rejected");
            return Err(StorageError::Conflict);
        }

        for topic_id in progress.completed() {
            sqlx::query(
                r"
                INSERT OR IGNORE INTO completed_topics (user_id, topic_id, completed_at)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(uid)
            .bind(topic_id.as_str().to_owned())
            .bind(saved_at)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn completion_history(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(TopicId, DateTime<Utc>)>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT topic_id, completed_at
            FROM completed_topics
            WHERE user_id = ?1
            ORDER BY completed_at ASC, topic_id ASC
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let topic_id = topic_id_from_str(row.try_get("topic_id").map_err(ser)?)?;
            let completed_at: DateTime<Utc> = row.try_get("completed_at").map_err(ser)?;
            history.push((topic_id, completed_at));
        }
        Ok(history)
    }
}
