// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content signatures.
//!
//! Every serializable track and binding carries a signature that is
//! regenerated whenever its content is edited. Only equality is meaningful.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque version token stamped on edited content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(Uuid);

impl Signature {
    /// Create a fresh signature
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Replace with a fresh signature
    pub fn regenerate(&mut self) {
        *self = Self::new();
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
