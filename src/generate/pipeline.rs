//! Orchestration of one story request
//!
//! Failure policy:
//! - story generation failure stops the run, nothing is saved
//! - illustration failure or timeout degrades to the fallback image
//! - storage failure degrades to an unsaved story that is still returned

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{
    GenerationError, IllustrationGenerator, IllustrationResult, StoryGenerator, StoryResult,
};
use crate::policy;
use crate::stories::{GeneratedStory, GenerationRequest, StorySink};

/// A finished run, saved or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryRun {
    pub record: GeneratedStory,
    pub story: StoryResult,
    pub illustration: IllustrationResult,
    /// Whether the record reached storage
    pub saved: bool,
}

/// Something that went wrong without stopping the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Image service credentials are missing
    IllustrationUnavailable(String),
    IllustrationFailed(String),
    IllustrationTimedOut,
    NotSaved(String),
}

impl Warning {
    /// Stable identifier for API clients
    pub fn kind(&self) -> &'static str {
        match self {
            Warning::IllustrationUnavailable(_) => "illustration_unavailable",
            Warning::IllustrationFailed(_) => "illustration_failed",
            Warning::IllustrationTimedOut => "illustration_timed_out",
            Warning::NotSaved(_) => "not_saved",
        }
    }

    /// Message shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            Warning::IllustrationUnavailable(_) => {
                "Illustrations are not available right now, so a default picture is shown"
            }
            Warning::IllustrationFailed(_) => {
                "We couldn't create an illustration, so a default picture is shown"
            }
            Warning::IllustrationTimedOut => {
                "The illustration took too long, so a default picture is shown"
            }
            Warning::NotSaved(_) => "Your story is ready but could not be saved",
        }
    }
}

/// Why a run produced no story
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Content policy refused the genre for this age
    Rejected,
    Generation(GenerationError),
}

impl Failure {
    /// Message shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            Failure::Rejected => "Selected story type is not appropriate for this age",
            Failure::Generation(GenerationError::Configuration(_)) => {
                "Story generation is not available right now"
            }
            Failure::Generation(_) => "An error occurred while generating the story",
        }
    }
}

/// Result of one orchestrated run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(StoryRun),
    Degraded { run: StoryRun, warnings: Vec<Warning> },
    Failed(Failure),
}

impl Outcome {
    /// The finished run, if any
    pub fn run(&self) -> Option<&StoryRun> {
        match self {
            Outcome::Success(run) | Outcome::Degraded { run, .. } => Some(run),
            Outcome::Failed(_) => None,
        }
    }
}

/// Sequences policy, story, illustration, and storage
pub struct Orchestrator {
    stories: StoryGenerator,
    illustrations: IllustrationGenerator,
    sink: Arc<dyn StorySink>,
}

impl Orchestrator {
    pub fn new(
        stories: StoryGenerator,
        illustrations: IllustrationGenerator,
        sink: Arc<dyn StorySink>,
    ) -> Self {
        Self {
            stories,
            illustrations,
            sink,
        }
    }

    /// Run the whole pipeline for one request
    pub async fn run(&self, request: GenerationRequest) -> Outcome {
        let name = request.child_name();
        let age = request.child_age();
        let genre = request.genre();

        if !policy::is_allowed(age, genre) {
            info!("Rejected {} story for age {}", genre, age);
            return Outcome::Failed(Failure::Rejected);
        }

        let story = match self.stories.generate(name, age, genre).await {
            Ok(story) => story,
            Err(e) => {
                error!("Story generation failed for {}: {}", name, e);
                return Outcome::Failed(Failure::Generation(e));
            }
        };

        let mut warnings = Vec::new();

        let illustration = match self.illustrations.generate(&story.text).await {
            Ok(illustration) => {
                if illustration.is_fallback() {
                    warnings.push(Warning::IllustrationTimedOut);
                }
                illustration
            }
            Err(GenerationError::Configuration(key)) => {
                warn!("Illustration skipped, image service not configured: {}", key);
                warnings.push(Warning::IllustrationUnavailable(key));
                IllustrationResult::fallback()
            }
            Err(e) => {
                warn!("Illustration failed for {}'s story: {}", name, e);
                warnings.push(Warning::IllustrationFailed(e.to_string()));
                IllustrationResult::fallback()
            }
        };

        let record = GeneratedStory::new(&request, &story.text, &illustration.image_reference);
        let saved = match self.sink.save(&record).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not save story {}: {}", record.id, e);
                warnings.push(Warning::NotSaved(e.to_string()));
                false
            }
        };

        let run = StoryRun {
            record,
            story,
            illustration,
            saved,
        };

        if warnings.is_empty() {
            info!("Story {} ready for {}", run.record.id, name);
            Outcome::Success(run)
        } else {
            info!(
                "Story {} ready for {} with {} warning(s)",
                run.record.id,
                name,
                warnings.len()
            );
            Outcome::Degraded { run, warnings }
        }
    }
}
