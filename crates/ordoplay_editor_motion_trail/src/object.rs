// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trail identities and the objects trails follow.

use ordoplay_editor_sequencer::{ControlRigId, EntityId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrailId(pub Uuid);

impl TrailId {
    /// Create a new random trail ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrailId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// The object a trail follows.
///
/// These are non-owning handles: the object can disappear from the world at
/// any time, and a handle that no longer resolves means the object is gone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrailObject {
    /// An actor's root
    Actor(EntityId),
    /// A named component of an actor
    Component {
        /// Owning actor
        entity: EntityId,
        /// Component name
        component: String,
    },
    /// A socket on a component
    Socket {
        /// Owning actor
        entity: EntityId,
        /// Component name
        component: String,
        /// Socket name
        socket: String,
    },
    /// A control on a control rig
    Control {
        /// Rig instance
        rig: ControlRigId,
        /// Control name
        control: String,
    },
}

impl TrailObject {
    /// Entity this object belongs to, when known without a host lookup
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Self::Actor(entity) | Self::Component { entity, .. } | Self::Socket { entity, .. } => {
                Some(*entity)
            }
            Self::Control { .. } => None,
        }
    }

    /// Rig this object belongs to, for controls
    pub fn rig(&self) -> Option<ControlRigId> {
        match self {
            Self::Control { rig, .. } => Some(*rig),
            _ => None,
        }
    }

    /// Whether this is a control rig control
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Control { .. })
    }

    /// Short label for logs and default trail names
    pub fn label(&self) -> String {
        match self {
            Self::Actor(entity) => format!("Actor {}", entity.0.simple()),
            Self::Component { component, .. } => component.clone(),
            Self::Socket { socket, .. } => socket.clone(),
            Self::Control { control, .. } => control.clone(),
        }
    }
}
