// SPDX-License-Identifier: MIT OR Apache-2.0
//! Motion trail errors.
//!
//! Only user-initiated actions return errors. The per-tick update path never
//! fails; it encodes trouble as cache state instead.

use crate::object::TrailId;
use ordoplay_editor_sequencer::FrameNumber;
use thiserror::Error;

/// Errors from trail actions and option persistence
#[derive(Debug, Error)]
pub enum TrailError {
    /// Pinning would exceed the configured maximum
    #[error("Cannot pin more than {max} trails")]
    PinLimitExceeded {
        /// Configured maximum
        max: usize,
    },

    /// No trail with this ID
    #[error("Trail not found: {0:?}")]
    TrailNotFound(TrailId),

    /// The trail's object has no editable transform track
    #[error("Trail has no transform track: {0:?}")]
    NoTransformTrack(TrailId),

    /// A key edit was requested with an empty selection
    #[error("No keys selected")]
    NoKeysSelected,

    /// No key found at or next to this tick
    #[error("Key not found at frame {0}")]
    KeyNotFound(FrameNumber),

    /// Reading or writing the options file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Options file is not valid RON
    #[error("Failed to parse options: {0}")]
    Deserialize(#[from] ron::error::SpannedError),

    /// Options could not be written as RON
    #[error("Failed to write options: {0}")]
    Serialize(#[from] ron::Error),
}

/// Result type for trail actions
pub type Result<T> = std::result::Result<T, TrailError>;
