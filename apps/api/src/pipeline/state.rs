//! Run state and its transition table.
//!
//! `RunState` is a plain value; `reduce` is the only way to move it forward.
//! The orchestrator feeds it one event per stage boundary and never mutates
//! stage or error fields directly.

use serde::Serialize;
use thiserror::Error;

use crate::llm_client::GenerationError;

/// The three generation stages, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    Bullets,
    Skills,
    CoverLetter,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Bullets => "bullets",
            StageKind::Skills => "skills",
            StageKind::CoverLetter => "cover-letter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bullets" => Some(StageKind::Bullets),
            "skills" => Some(StageKind::Skills),
            "cover-letter" | "cover_letter" | "coverLetter" => Some(StageKind::CoverLetter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Idle,
    Bullets,
    Skills,
    CoverLetter,
    Complete,
    Error,
}

impl From<StageKind> for Stage {
    fn from(kind: StageKind) -> Self {
        match kind {
            StageKind::Bullets => Stage::Bullets,
            StageKind::Skills => Stage::Skills,
            StageKind::CoverLetter => Stage::CoverLetter,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Bullets => "bullets",
            Stage::Skills => "skills",
            Stage::CoverLetter => "cover-letter",
            Stage::Complete => "complete",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

/// Whether the run is on its first pass or re-running from a given stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "stage", rename_all = "snake_case")]
pub enum RunMode {
    Initial,
    Retry(StageKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Transport,
    SchemaViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Validation,
            message: message.into(),
        }
    }
}

impl From<GenerationError> for StageFailure {
    fn from(e: GenerationError) -> Self {
        let kind = match &e {
            GenerationError::Configuration(_) => FailureKind::Transport,
            e if e.is_retryable() => FailureKind::Transport,
            _ => FailureKind::SchemaViolation,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

/// Per-stage error slots. A slot is set iff that stage's latest attempt failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bullets: Option<StageFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<StageFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<StageFailure>,
}

impl StageErrors {
    fn slot_mut(&mut self, kind: StageKind) -> &mut Option<StageFailure> {
        match kind {
            StageKind::Bullets => &mut self.bullets,
            StageKind::Skills => &mut self.skills,
            StageKind::CoverLetter => &mut self.cover_letter,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_none() && self.skills.is_none() && self.cover_letter.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Start,
    Succeeded(StageKind),
    Failed(StageKind, StageFailure),
    Retry(StageKind),
    Reset,
}

impl RunEvent {
    fn name(&self) -> String {
        match self {
            RunEvent::Start => "start".to_string(),
            RunEvent::Succeeded(k) => format!("{} success", k.as_str()),
            RunEvent::Failed(k, _) => format!("{} failure", k.as_str()),
            RunEvent::Retry(k) => format!("retry of {}", k.as_str()),
            RunEvent::Reset => "reset".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {event} while the run is {stage}")]
pub struct TransitionError {
    pub stage: Stage,
    pub event: String,
}

/// Summary of where a run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Pending,
    Succeeded,
    PartialFailure,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub stage: Stage,
    pub mode: RunMode,
    pub errors: StageErrors,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            stage: Stage::Idle,
            mode: RunMode::Initial,
            errors: StageErrors::default(),
        }
    }
}

impl RunState {
    /// The stage currently executing, if any.
    pub fn active_stage(&self) -> Option<StageKind> {
        match self.stage {
            Stage::Bullets => Some(StageKind::Bullets),
            Stage::Skills => Some(StageKind::Skills),
            Stage::CoverLetter => Some(StageKind::CoverLetter),
            Stage::Idle | Stage::Complete | Stage::Error => None,
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        match self.stage {
            Stage::Complete if self.errors.is_empty() => RunOutcome::Succeeded,
            Stage::Complete => RunOutcome::PartialFailure,
            Stage::Error => RunOutcome::Aborted,
            _ => RunOutcome::Pending,
        }
    }

    fn enter(&self, kind: StageKind, mode: RunMode) -> RunState {
        let mut errors = self.errors.clone();
        *errors.slot_mut(kind) = None;
        RunState {
            stage: kind.into(),
            mode,
            errors,
        }
    }

    fn record(&self, kind: StageKind, failure: Option<StageFailure>) -> RunState {
        let mut next = self.clone();
        *next.errors.slot_mut(kind) = failure;
        next
    }
}

/// Applies one event. Pure: the input state is never modified.
pub fn reduce(state: &RunState, event: RunEvent) -> Result<RunState, TransitionError> {
    let illegal = |event: &RunEvent| TransitionError {
        stage: state.stage,
        event: event.name(),
    };

    match (state.stage, &event) {
        (_, RunEvent::Reset) => Ok(RunState::default()),

        (Stage::Idle | Stage::Error, RunEvent::Start)
        | (Stage::Error, RunEvent::Retry(StageKind::Bullets)) => Ok(RunState {
            stage: Stage::Bullets,
            mode: RunMode::Initial,
            errors: StageErrors::default(),
        }),

        (Stage::Complete, RunEvent::Retry(kind)) => Ok(state.enter(*kind, RunMode::Retry(*kind))),

        (Stage::Bullets, RunEvent::Succeeded(StageKind::Bullets)) => Ok(state
            .record(StageKind::Bullets, None)
            .enter(StageKind::Skills, state.mode)),

        (Stage::Bullets, RunEvent::Failed(StageKind::Bullets, failure)) => {
            let mut next = state.record(StageKind::Bullets, Some(failure.clone()));
            next.stage = match state.mode {
                RunMode::Initial => Stage::Error,
                RunMode::Retry(_) => Stage::Complete,
            };
            Ok(next)
        }

        (Stage::Skills, RunEvent::Succeeded(StageKind::Skills))
        | (Stage::Skills, RunEvent::Failed(StageKind::Skills, _)) => {
            let failure = match &event {
                RunEvent::Failed(_, failure) => Some(failure.clone()),
                _ => None,
            };
            let next = state.record(StageKind::Skills, failure);
            if state.mode == RunMode::Retry(StageKind::Skills) {
                Ok(RunState {
                    stage: Stage::Complete,
                    ..next
                })
            } else {
                Ok(next.enter(StageKind::CoverLetter, state.mode))
            }
        }

        (Stage::CoverLetter, RunEvent::Succeeded(StageKind::CoverLetter)) => Ok(RunState {
            stage: Stage::Complete,
            ..state.record(StageKind::CoverLetter, None)
        }),

        (Stage::CoverLetter, RunEvent::Failed(StageKind::CoverLetter, failure)) => Ok(RunState {
            stage: Stage::Complete,
            ..state.record(StageKind::CoverLetter, Some(failure.clone()))
        }),

        _ => Err(illegal(&event)),
    }
}
