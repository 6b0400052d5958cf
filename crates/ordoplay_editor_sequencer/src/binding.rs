// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object bindings.
//!
//! A binding ties a scene entity to the sequence. Tracks hang off bindings,
//! never off entities directly.

use crate::signature::Signature;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity ID in the edited world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(pub Uuid);

impl BindingId {
    /// Create a new random binding ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

/// Binding of an entity to the sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectBinding {
    /// Binding ID
    pub id: BindingId,
    /// Display name
    pub name: String,
    /// Bound entity
    entity: EntityId,
    /// Binding-level signature
    signature: Signature,
}

impl ObjectBinding {
    /// Create a binding to an entity
    pub fn new(name: impl Into<String>, entity: EntityId) -> Self {
        Self {
            id: BindingId::new(),
            name: name.into(),
            entity,
            signature: Signature::new(),
        }
    }

    /// Bound entity
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Rebind to another entity
    pub fn set_entity(&mut self, entity: EntityId) {
        self.entity = entity;
        self.signature.regenerate();
    }

    /// Current signature
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Mark the binding as edited
    pub fn mark_changed(&mut self) {
        self.signature.regenerate();
    }
}
