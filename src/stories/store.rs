//! SQLite story storage

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use thiserror::Error;
use tracing::debug;

use super::{GeneratedStory, StoryGenre};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt story row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Destination for finished stories
#[async_trait]
pub trait StorySink: Send + Sync {
    /// Persist a finished story
    async fn save(&self, story: &GeneratedStory) -> Result<(), StoreError>;
}

type StoryRow = (String, String, i64, String, String, Option<String>, String);

/// Story store backed by the `stories` table
#[derive(Clone)]
pub struct StoryStore {
    pool: SqlitePool,
}

impl StoryStore {
    /// Create a new story store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a story by ID
    pub async fn get(&self, id: &str) -> Result<Option<GeneratedStory>, StoreError> {
        let row: Option<StoryRow> = sqlx::query_as(
            "SELECT id, child_name, child_age, story_type, content, image_url, created_at
             FROM stories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::from_row).transpose()
    }

    /// Most recent stories, newest first
    pub async fn recent(&self, limit: u32) -> Result<Vec<GeneratedStory>, StoreError> {
        let rows: Vec<StoryRow> = sqlx::query_as(
            "SELECT id, child_name, child_age, story_type, content, image_url, created_at
             FROM stories ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::from_row).collect()
    }

    fn from_row(row: StoryRow) -> Result<GeneratedStory, StoreError> {
        let (id, child_name, child_age, story_type, content, image_url, created_at) = row;

        let genre = StoryGenre::from_str(&story_type).ok_or_else(|| StoreError::Corrupt {
            id: id.clone(),
            reason: format!("unknown story type '{}'", story_type),
        })?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StoreError::Corrupt {
                id: id.clone(),
                reason: format!("bad timestamp: {}", e),
            })?
            .with_timezone(&chrono::Utc);
        let child_age = u32::try_from(child_age).map_err(|_| StoreError::Corrupt {
            id: id.clone(),
            reason: format!("bad age {}", child_age),
        })?;

        Ok(GeneratedStory {
            id,
            child_name,
            child_age,
            genre,
            content,
            image_reference: image_url.unwrap_or_default(),
            created_at,
        })
    }
}

#[async_trait]
impl StorySink for StoryStore {
    async fn save(&self, story: &GeneratedStory) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO stories
                 (id, child_name, child_age, story_type, content, image_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&story.id)
        .bind(&story.child_name)
        .bind(story.child_age as i64)
        .bind(story.genre.as_str())
        .bind(&story.content)
        .bind(&story.image_reference)
        .bind(story.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Saved story {} for {}", story.id, story.child_name);
        Ok(())
    }
}
