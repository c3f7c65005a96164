//! Spool file lifecycle.
//!
//! A spool file moves through four states, encoded in where it lives and
//! which suffix its name carries:
//!
//! ```text
//! Open     <staging>/message_<ts>_<n>.hsxa        writer owns it
//! Ready    <handling>/message_<ts>_<n>.hsxa       visible to readers
//! Claimed  <handling>/message_<ts>_<n>.hsxa_bak   one reader owns it
//! Gone     (deleted)
//! ```
//!
//! The rename Ready→Claimed is the only exclusion mechanism between
//! readers. [`SpoolFileState::transition`] rejects every other move so the
//! protocol can be checked without touching a filesystem.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::SpoolError;

/// Suffix of a file that is ready to be claimed.
pub const READY_EXT: &str = ".hsxa";

/// Suffix of a file claimed by a reader.
pub const CLAIMED_EXT: &str = ".hsxa_bak";

/// Lifecycle state of a spool file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpoolFileState {
    /// Being written in the staging area.
    Open,
    /// Closed and handed off to the handling directory.
    Ready,
    /// Renamed by exactly one reader.
    Claimed,
    /// Deleted after a complete forward.
    Gone,
}

/// Event applied to a spool file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpoolEvent {
    /// Writer closed the file and moved it into the handling directory.
    Handoff,
    /// Reader renamed the file to the Claimed suffix.
    Claim,
    /// Reader failed mid-file and renamed it back to Ready.
    Release,
    /// Reader forwarded every line and deleted the file.
    Complete,
}

impl SpoolFileState {
    /// Applies `event`, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns `SpoolError::InvalidTransition` if `event` is not allowed
    /// from the current state.
    pub fn transition(self, event: SpoolEvent) -> Result<SpoolFileState, SpoolError> {
        match (self, event) {
            (SpoolFileState::Open, SpoolEvent::Handoff)
            | (SpoolFileState::Claimed, SpoolEvent::Release) => Ok(SpoolFileState::Ready),
            (SpoolFileState::Ready, SpoolEvent::Claim) => Ok(SpoolFileState::Claimed),
            (SpoolFileState::Claimed, SpoolEvent::Complete) => Ok(SpoolFileState::Gone),
            (from, event) => Err(SpoolError::InvalidTransition { from, event }),
        }
    }

    /// Classifies an entry of the handling directory by its suffix.
    ///
    /// Returns `None` for names that belong to neither state; those are
    /// ignored by readers.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<SpoolFileState> {
        // CLAIMED_EXT extends READY_EXT, so test it first.
        if name.ends_with(CLAIMED_EXT) {
            Some(SpoolFileState::Claimed)
        } else if name.ends_with(READY_EXT) {
            Some(SpoolFileState::Ready)
        } else {
            None
        }
    }
}

impl fmt::Display for SpoolFileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpoolFileState::Open => write!(f, "Open"),
            SpoolFileState::Ready => write!(f, "Ready"),
            SpoolFileState::Claimed => write!(f, "Claimed"),
            SpoolFileState::Gone => write!(f, "Gone"),
        }
    }
}

impl fmt::Display for SpoolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpoolEvent::Handoff => write!(f, "Handoff"),
            SpoolEvent::Claim => write!(f, "Claim"),
            SpoolEvent::Release => write!(f, "Release"),
            SpoolEvent::Complete => write!(f, "Complete"),
        }
    }
}

/// A spool file in the handling directory together with its tracked state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolEntry {
    path: PathBuf,
    state: SpoolFileState,
}

impl SpoolEntry {
    /// Creates an entry for a Ready file.
    ///
    /// # Errors
    ///
    /// Returns `SpoolError::UnrecognizedName` unless the name carries the
    /// Ready suffix.
    pub fn ready(path: impl Into<PathBuf>) -> Result<Self, SpoolError> {
        let path = path.into();
        match file_name(&path).and_then(SpoolFileState::from_file_name) {
            Some(SpoolFileState::Ready) => Ok(Self {
                path,
                state: SpoolFileState::Ready,
            }),
            _ => Err(SpoolError::UnrecognizedName(path)),
        }
    }

    /// Creates an entry for a Claimed file left behind by another reader.
    ///
    /// # Errors
    ///
    /// Returns `SpoolError::UnrecognizedName` unless the name carries the
    /// Claimed suffix.
    pub fn claimed(path: impl Into<PathBuf>) -> Result<Self, SpoolError> {
        let path = path.into();
        match file_name(&path).and_then(SpoolFileState::from_file_name) {
            Some(SpoolFileState::Claimed) => Ok(Self {
                path,
                state: SpoolFileState::Claimed,
            }),
            _ => Err(SpoolError::UnrecognizedName(path)),
        }
    }

    /// Current path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state of the file.
    #[must_use]
    pub fn state(&self) -> SpoolFileState {
        self.state
    }

    /// Path the file will have once `event` is applied.
    ///
    /// # Errors
    ///
    /// Returns `SpoolError::InvalidTransition` if `event` is not allowed,
    /// or if it does not rename the file (`Handoff` and `Complete`).
    pub fn target_path(&self, event: SpoolEvent) -> Result<PathBuf, SpoolError> {
        let next = self.state.transition(event)?;
        match (self.state, next) {
            (SpoolFileState::Ready, SpoolFileState::Claimed) => {
                Ok(swap_suffix(&self.path, READY_EXT, CLAIMED_EXT))
            }
            (SpoolFileState::Claimed, SpoolFileState::Ready) => {
                Ok(swap_suffix(&self.path, CLAIMED_EXT, READY_EXT))
            }
            _ => Err(SpoolError::InvalidTransition {
                from: self.state,
                event,
            }),
        }
    }

    /// Records that `event` happened, updating path and state.
    ///
    /// # Errors
    ///
    /// Returns `SpoolError::InvalidTransition` if `event` is not allowed.
    pub fn apply(&mut self, event: SpoolEvent) -> Result<(), SpoolError> {
        let next = self.state.transition(event)?;
        if next != SpoolFileState::Gone {
            self.path = self.target_path(event)?;
        }
        self.state = next;
        Ok(())
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn swap_suffix(path: &Path, from: &str, to: &str) -> PathBuf {
    let raw = path.to_string_lossy();
    let stem = raw.strip_suffix(from).unwrap_or(&raw);
    PathBuf::from(format!("{stem}{to}"))
}
