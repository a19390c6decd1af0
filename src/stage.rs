//! Pipeline stage state machine.
//!
//! A document moves forward through
//! `uploaded → staged → processing → processed`. `failed` can be entered
//! from any non-terminal stage. `processed` and `failed` are terminal, and
//! no stage is ever re-entered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::storage::Folder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Uploaded,
    Staged,
    Processing,
    Processed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("illegal stage transition: {from} -> {to}")]
    IllegalTransition { from: Stage, to: Stage },
    #[error("unknown stage: '{0}'")]
    Unknown(String),
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Uploaded,
        Stage::Staged,
        Stage::Processing,
        Stage::Processed,
        Stage::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Uploaded => "uploaded",
            Stage::Staged => "staged",
            Stage::Processing => "processing",
            Stage::Processed => "processed",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Processed | Stage::Failed)
    }

    /// The next stage on the success path, if any.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Uploaded => Some(Stage::Staged),
            Stage::Staged => Some(Stage::Processing),
            Stage::Processing => Some(Stage::Processed),
            Stage::Processed | Stage::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Stage::Failed || self.next() == Some(to)
    }

    pub fn transition(self, to: Stage) -> Result<Stage, StageError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(StageError::IllegalTransition { from: self, to })
        }
    }

    /// Blob folder holding a document in this stage. A failed document
    /// stays in whichever folder it failed in.
    pub fn folder(&self) -> Option<Folder> {
        match self {
            Stage::Uploaded => Some(Folder::Upload),
            Stage::Staged => Some(Folder::Staging),
            Stage::Processing => Some(Folder::Processing),
            Stage::Processed => Some(Folder::Processed),
            Stage::Failed => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| StageError::Unknown(s.to_string()))
    }
}
