//! Story generation with a personalisation check
//!
//! The text backend is asked for a short story that names the child at least
//! three times. Replies that fall short are retried with the same prompt.

use std::sync::Arc;

use regex::RegexBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{GenerationError, TextBackend};
use crate::stories::StoryGenre;

/// Minimum case-insensitive mentions of the child's name
pub const MIN_NAME_OCCURRENCES: usize = 3;

/// Default number of backend calls per story
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A story that passed the personalisation check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryResult {
    pub text: String,
    /// Backend calls made, including the successful one
    pub attempts_used: u32,
}

/// Genre-specific guidance appended to the prompt
fn genre_guidance(genre: StoryGenre) -> &'static str {
    match genre {
        StoryGenre::Fairy => {
            "Include magical elements such as fairies, enchanted places, or talking animals."
        }
        StoryGenre::Adventure => {
            "Include exciting challenges that stay safe, with a brave and clever hero."
        }
        StoryGenre::Educational => {
            "Weave in a learning moment about good values or a simple science fact."
        }
        StoryGenre::Bedtime => "Keep the pace gentle and end with a calm, peaceful resolution.",
    }
}

/// Build the story prompt for one child
pub fn story_prompt(name: &str, age: u32, genre: StoryGenre) -> String {
    format!(
        r#"Write a {genre} story for a {age}-year-old child named {name}.

Requirements:
- Length: about 300-400 words.
- The child's name "{name}" must appear naturally at least {min} times.
- Use vocabulary and themes suitable for a {age}-year-old.
- {guidance}

Respond with ONLY the story text, no title or preamble."#,
        genre = genre.as_str(),
        age = age,
        name = name,
        min = MIN_NAME_OCCURRENCES,
        guidance = genre_guidance(genre),
    )
}

/// Count case-insensitive, non-overlapping occurrences of `name` in `text`
pub fn count_name_occurrences(text: &str, name: &str) -> usize {
    let name = name.trim();
    if name.is_empty() {
        return 0;
    }

    match RegexBuilder::new(&regex::escape(name))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re.find_iter(text).count(),
        Err(_) => 0,
    }
}

/// Story generator with bounded retries
pub struct StoryGenerator {
    backend: Arc<dyn TextBackend>,
    max_retries: u32,
}

impl StoryGenerator {
    /// Create a generator making at most `max_retries` backend calls per story
    pub fn new(backend: Arc<dyn TextBackend>, max_retries: u32) -> Self {
        Self {
            backend,
            max_retries: max_retries.max(1),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Generate a story mentioning `name` at least [`MIN_NAME_OCCURRENCES`] times
    pub async fn generate(
        &self,
        name: &str,
        age: u32,
        genre: StoryGenre,
    ) -> Result<StoryResult, GenerationError> {
        let prompt = story_prompt(name, age, genre);

        for attempt in 0..self.max_retries {
            let is_last = attempt + 1 == self.max_retries;
            debug!("Requesting {} story for {} (attempt {})", genre, name, attempt + 1);

            let text = match self.backend.complete(&prompt).await {
                Ok(text) => text,
                Err(e) if !e.is_retryable() || is_last => return Err(e),
                Err(e) => {
                    warn!("Story attempt {} failed: {}", attempt + 1, e);
                    continue;
                }
            };

            let mentions = count_name_occurrences(&text, name);
            if mentions >= MIN_NAME_OCCURRENCES {
                info!(
                    "Generated {} story for {} on attempt {}",
                    genre,
                    name,
                    attempt + 1
                );
                return Ok(StoryResult {
                    text,
                    attempts_used: attempt + 1,
                });
            }

            warn!(
                "Story attempt {} named {} only {} times, retrying",
                attempt + 1,
                name,
                mentions
            );
        }

        Err(GenerationError::InsufficientQuality {
            attempts: self.max_retries,
        })
    }
}
