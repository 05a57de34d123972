//! Story data model and persistence
//!
//! Provides:
//! - Story genres and validated generation requests
//! - The persisted story record
//! - SQLite-backed story storage

mod store;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use store::{StoreError, StorySink, StoryStore};

/// Youngest supported reader
pub const MIN_CHILD_AGE: u32 = 1;
/// Oldest supported reader
pub const MAX_CHILD_AGE: u32 = 12;
/// Longest accepted child name, in characters
pub const MAX_NAME_LEN: usize = 100;

/// Letters and whitespace only
static CHILD_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\p{L}\s]+$").unwrap());

/// Story genre selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryGenre {
    Fairy,
    Adventure,
    Educational,
    Bedtime,
}

impl StoryGenre {
    /// Every genre, in display order
    pub const ALL: [StoryGenre; 4] = [
        StoryGenre::Fairy,
        StoryGenre::Adventure,
        StoryGenre::Educational,
        StoryGenre::Bedtime,
    ];

    /// Lowercase name used in forms and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryGenre::Fairy => "fairy",
            StoryGenre::Adventure => "adventure",
            StoryGenre::Educational => "educational",
            StoryGenre::Bedtime => "bedtime",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<StoryGenre> {
        match s.trim().to_lowercase().as_str() {
            "fairy" => Some(StoryGenre::Fairy),
            "adventure" => Some(StoryGenre::Adventure),
            "educational" => Some(StoryGenre::Educational),
            "bedtime" => Some(StoryGenre::Bedtime),
            _ => None,
        }
    }
}

impl fmt::Display for StoryGenre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form validation errors. The messages are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Please fill in all fields")]
    MissingField,

    #[error("Name must be at most {MAX_NAME_LEN} characters")]
    NameTooLong,

    #[error("Name may only contain letters and spaces")]
    InvalidName,

    #[error("Age must be a whole number between {MIN_CHILD_AGE} and {MAX_CHILD_AGE}")]
    InvalidAge,

    #[error("Unknown story type: {0}")]
    UnknownGenre(String),
}

/// A validated request to write one story
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    child_name: String,
    child_age: u32,
    genre: StoryGenre,
}

impl GenerationRequest {
    /// Create a request, validating name and age
    pub fn new(child_name: &str, child_age: u32, genre: StoryGenre) -> Result<Self, RequestError> {
        let name = child_name.trim();
        if name.is_empty() {
            return Err(RequestError::MissingField);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(RequestError::NameTooLong);
        }
        if !CHILD_NAME_REGEX.is_match(name) {
            return Err(RequestError::InvalidName);
        }
        if !(MIN_CHILD_AGE..=MAX_CHILD_AGE).contains(&child_age) {
            return Err(RequestError::InvalidAge);
        }

        Ok(Self {
            child_name: name.to_string(),
            child_age,
            genre,
        })
    }

    /// Create a request from raw form fields
    pub fn from_form(
        child_name: &str,
        child_age: &str,
        story_type: &str,
    ) -> Result<Self, RequestError> {
        if [child_name, child_age, story_type]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(RequestError::MissingField);
        }

        let age = child_age
            .trim()
            .parse::<u32>()
            .map_err(|_| RequestError::InvalidAge)?;
        let genre = StoryGenre::from_str(story_type)
            .ok_or_else(|| RequestError::UnknownGenre(story_type.trim().to_string()))?;

        Self::new(child_name, age, genre)
    }

    pub fn child_name(&self) -> &str {
        &self.child_name
    }

    pub fn child_age(&self) -> u32 {
        self.child_age
    }

    pub fn genre(&self) -> StoryGenre {
        self.genre
    }
}

/// A story as persisted and shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub id: String,
    pub child_name: String,
    pub child_age: u32,
    pub genre: StoryGenre,
    pub content: String,
    pub image_reference: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl GeneratedStory {
    /// Create a new record with a fresh ID and timestamp
    pub fn new(request: &GenerationRequest, content: &str, image_reference: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            child_name: request.child_name().to_string(),
            child_age: request.child_age(),
            genre: request.genre(),
            content: content.to_string(),
            image_reference: image_reference.to_string(),
            created_at: chrono::Utc::now(),
        }
    }
}
