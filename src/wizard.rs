//! Custom-request wizard: upload → preferences → summary → confirmation.
//!
//! A [`WizardSession`] is exclusively owned by whoever drives it. Generation is
//! split into `begin_generation` / `complete_generation` so a driver that keeps
//! sessions behind a lock can release it while the generator runs; a result
//! that comes back for a replaced image is discarded instead of applied.

use crate::brief::{generate_with_timeout, BriefGenerator};
use crate::error::{BriefError, WizardError};
use crate::models::{CustomRequest, DesignBrief, ImageUpload, SessionView, Step};
use crate::submitter::{dispatch_submission, RequestSubmitter};
use chrono::{DateTime, Utc};
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_PREFERENCE_SEED: usize = 3;
pub const NO_IMAGE_MESSAGE: &str = "no image selected";

#[derive(Debug, Clone)]
pub struct WizardSession {
    id: Uuid,
    step: Step,
    image: Option<ImageUpload>,
    notes: String,
    brief: Option<DesignBrief>,
    selected_preferences: BTreeSet<String>,
    error: Option<String>,
    generating: bool,
    epoch: u64,
    seed_count: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Snapshot of what an in-flight generation was started with.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    epoch: u64,
    pub image: ImageUpload,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Applied,
    Discarded,
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new(DEFAULT_PREFERENCE_SEED)
    }
}

impl WizardSession {
    /// `seed_count` preferences are pre-selected from each new brief; 0 leaves the selection empty.
    pub fn new(seed_count: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            step: Step::Upload,
            image: None,
            notes: String::new(),
            brief: None,
            selected_preferences: BTreeSet::new(),
            error: None,
            generating: false,
            epoch: 0,
            seed_count,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn brief(&self) -> Option<&DesignBrief> {
        self.brief.as_ref()
    }

    pub fn selected_preferences(&self) -> &BTreeSet<String> {
        &self.selected_preferences
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn require(&self, expected: Step, action: &'static str) -> Result<(), WizardError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition { action, step: self.step })
        }
    }

    /// Replace the inspiration image. Drops any brief and selection derived from
    /// the previous one and orphans an in-flight generation.
    pub fn select_image(&mut self, image: ImageUpload) -> Result<(), WizardError> {
        self.require(Step::Upload, "change the image")?;
        info!("🖼️ Session {} image set: {} ({}, {} bytes)", self.id, image.filename, image.mime_type, image.size());
        self.image = Some(image);
        self.brief = None;
        self.selected_preferences.clear();
        self.error = None;
        self.generating = false;
        self.epoch += 1;
        self.touch();
        Ok(())
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<(), WizardError> {
        self.require(Step::Upload, "edit notes")?;
        self.notes = notes.into();
        self.touch();
        Ok(())
    }

    pub fn begin_generation(&mut self) -> Result<GenerationTicket, WizardError> {
        self.require(Step::Upload, "generate a brief")?;
        if self.generating {
            return Err(WizardError::GenerationInProgress);
        }
        let Some(image) = self.image.clone() else {
            self.error = Some(NO_IMAGE_MESSAGE.to_string());
            self.touch();
            return Err(BriefError::validation(NO_IMAGE_MESSAGE).into());
        };
        self.error = None;
        self.brief = None;
        self.selected_preferences.clear();
        self.generating = true;
        self.touch();
        Ok(GenerationTicket { epoch: self.epoch, image, notes: self.notes.clone() })
    }

    /// Apply the result of the generation started with `ticket`.
    ///
    /// Failures are recorded on the session and returned; the step stays at Upload.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<DesignBrief, BriefError>,
    ) -> Result<GenerationOutcome, WizardError> {
        if ticket.epoch != self.epoch || !self.generating {
            warn!("Session {} discarding stale generation result", self.id);
            return Ok(GenerationOutcome::Discarded);
        }
        self.generating = false;
        self.touch();
        match result {
            Ok(brief) => {
                self.selected_preferences = brief
                    .preference_options()
                    .take(self.seed_count)
                    .map(str::to_string)
                    .collect();
                info!("✅ Session {} brief ready: {}", self.id, brief.style);
                self.brief = Some(brief);
                self.step = Step::Preferences;
                Ok(GenerationOutcome::Applied)
            }
            Err(e) => {
                warn!("❌ Session {} brief generation failed: {}", self.id, e);
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Generate a brief for an exclusively owned session.
    pub async fn generate_brief(
        &mut self,
        generator: &dyn BriefGenerator,
        timeout: Duration,
    ) -> Result<(), WizardError> {
        let ticket = self.begin_generation()?;
        let result = generate_with_timeout(generator, &ticket.image, &ticket.notes, timeout).await;
        self.complete_generation(ticket, result).map(|_| ())
    }

    /// Add `item` if absent, remove it if present. Returns whether it is now selected.
    /// Items outside the current brief are kept like any other.
    pub fn toggle_preference(&mut self, item: &str) -> Result<bool, WizardError> {
        self.require(Step::Preferences, "change preferences")?;
        let selected = if self.selected_preferences.remove(item) {
            false
        } else {
            self.selected_preferences.insert(item.to_string());
            true
        };
        self.touch();
        Ok(selected)
    }

    /// Move forward: Preferences → Summary, or back into Preferences from Upload
    /// when a brief was kept from an earlier generation.
    pub fn advance(&mut self) -> Result<Step, WizardError> {
        let next = match self.step {
            Step::Upload if self.brief.is_some() && !self.generating => Step::Preferences,
            Step::Preferences => Step::Summary,
            step => return Err(WizardError::InvalidTransition { action: "continue", step }),
        };
        self.step = next;
        self.touch();
        Ok(next)
    }

    pub fn back(&mut self) -> Result<Step, WizardError> {
        let previous = match self.step {
            Step::Preferences => Step::Upload,
            Step::Summary => Step::Preferences,
            step => return Err(WizardError::InvalidTransition { action: "go back", step }),
        };
        self.step = previous;
        self.touch();
        Ok(previous)
    }

    /// Package the request and move to Confirmation. Delivery is the caller's concern.
    pub fn submit(&mut self) -> Result<CustomRequest, WizardError> {
        self.require(Step::Summary, "submit")?;
        let brief = self
            .brief
            .clone()
            .ok_or(WizardError::InvalidTransition { action: "submit", step: self.step })?;
        let request = CustomRequest {
            id: Uuid::new_v4(),
            brief,
            selected_preferences: self.selected_preferences.iter().cloned().collect(),
            notes: self.notes.clone(),
            image: self.image.as_ref().map(ImageUpload::metadata),
            submitted_at: Utc::now(),
        };
        self.step = Step::Confirmation;
        self.touch();
        info!("📨 Session {} submitted request {}", self.id, request.id);
        Ok(request)
    }

    /// Submit and hand the request to `submitter` without waiting for it.
    pub fn submit_to(&mut self, submitter: Arc<dyn RequestSubmitter>) -> Result<JoinHandle<()>, WizardError> {
        let request = self.submit()?;
        Ok(dispatch_submission(submitter, request))
    }

    /// Guard for the confirmation page's exit action, after which the session is dropped.
    pub fn finish(&self) -> Result<(), WizardError> {
        self.require(Step::Confirmation, "return")
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            step: self.step,
            image: self.image.as_ref().map(ImageUpload::metadata),
            notes: self.notes.clone(),
            brief: self.brief.clone(),
            selected_preferences: self.selected_preferences.iter().cloned().collect(),
            error: self.error.clone(),
            generating: self.generating,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
