// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory world that sequences are evaluated against.

use crate::object::TrailObject;
use indexmap::IndexMap;
use ordoplay_editor_sequencer::{ControlRigId, EntityId, Transform};

/// A named component on an entity
#[derive(Debug, Clone, Default)]
pub struct SceneComponent {
    /// Transform relative to the entity
    pub relative: Transform,
    /// Sockets, relative to the component
    pub sockets: IndexMap<String, Transform>,
}

impl SceneComponent {
    /// Create a component at `relative`
    pub fn new(relative: Transform) -> Self {
        Self {
            relative,
            sockets: IndexMap::new(),
        }
    }

    /// Add a socket
    pub fn with_socket(mut self, name: impl Into<String>, relative: Transform) -> Self {
        self.sockets.insert(name.into(), relative);
        self
    }
}

/// An entity placed in the world
#[derive(Debug, Clone)]
pub struct SceneEntity {
    /// Entity ID
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Placement, relative to `parent` when set
    pub transform: Transform,
    /// Manual attachment that the timeline does not drive
    pub parent: Option<EntityId>,
    /// Named components
    pub components: IndexMap<String, SceneComponent>,
    /// Spline points in local space, for path targets
    pub spline: Vec<[f64; 3]>,
}

impl SceneEntity {
    /// Position along the spline at `progress` (0..1), by arc length
    pub fn spline_point(&self, progress: f64) -> Option<[f64; 3]> {
        let first = *self.spline.first()?;
        let lengths: Vec<f64> = self.spline.windows(2).map(|w| distance(w[0], w[1])).collect();
        let total: f64 = lengths.iter().sum();
        if total <= f64::EPSILON {
            return Some(first);
        }

        let mut remaining = progress.clamp(0.0, 1.0) * total;
        for (segment, length) in self.spline.windows(2).zip(&lengths) {
            if remaining <= *length {
                let t = if *length > 0.0 { remaining / length } else { 0.0 };
                return Some([
                    segment[0][0] + (segment[1][0] - segment[0][0]) * t,
                    segment[0][1] + (segment[1][1] - segment[0][1]) * t,
                    segment[0][2] + (segment[1][2] - segment[0][2]) * t,
                ]);
            }
            remaining -= length;
        }
        self.spline.last().copied()
    }
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2) + (b[2] - a[2]).powi(2)).sqrt()
}

/// A control rig running on an entity's component
#[derive(Debug, Clone)]
pub struct ControlRigInstance {
    /// Rig ID
    pub id: ControlRigId,
    /// Owning entity
    pub owner: EntityId,
    /// Component the rig drives
    pub component: String,
    /// Initial control transforms, in component space
    pub controls: IndexMap<String, Transform>,
}

/// The edited world
#[derive(Debug, Clone, Default)]
pub struct Scene {
    entities: IndexMap<EntityId, SceneEntity>,
    rigs: IndexMap<ControlRigId, ControlRigInstance>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an entity with a root component
    pub fn spawn(&mut self, name: impl Into<String>, transform: Transform) -> EntityId {
        let id = EntityId::new();
        let mut components = IndexMap::new();
        components.insert("Root".to_string(), SceneComponent::default());
        self.entities.insert(
            id,
            SceneEntity {
                id,
                name: name.into(),
                transform,
                parent: None,
                components,
                spline: Vec::new(),
            },
        );
        id
    }

    /// Get an entity
    pub fn entity(&self, id: EntityId) -> Option<&SceneEntity> {
        self.entities.get(&id)
    }

    /// Get a mutable entity
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut SceneEntity> {
        self.entities.get_mut(&id)
    }

    /// Get all entities
    pub fn entities(&self) -> impl Iterator<Item = &SceneEntity> {
        self.entities.values()
    }

    /// Remove an entity, its rigs, and any manual attachments to it
    pub fn remove_entity(&mut self, id: EntityId) -> Option<SceneEntity> {
        let removed = self.entities.shift_remove(&id)?;
        self.rigs.retain(|_, rig| rig.owner != id);
        for entity in self.entities.values_mut() {
            if entity.parent == Some(id) {
                entity.parent = None;
            }
        }
        Some(removed)
    }

    /// Add a component to an entity
    pub fn add_component(&mut self, entity: EntityId, name: impl Into<String>, component: SceneComponent) -> bool {
        match self.entities.get_mut(&entity) {
            Some(e) => {
                e.components.insert(name.into(), component);
                true
            }
            None => false,
        }
    }

    /// Attach `child` to `parent` outside of the timeline
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        match self.entities.get_mut(&child) {
            Some(e) => {
                e.parent = parent;
                true
            }
            None => false,
        }
    }

    /// Add a control rig on an entity's component
    pub fn add_rig(
        &mut self,
        owner: EntityId,
        component: impl Into<String>,
        controls: impl IntoIterator<Item = (String, Transform)>,
    ) -> ControlRigId {
        let id = ControlRigId::new();
        self.rigs.insert(
            id,
            ControlRigInstance {
                id,
                owner,
                component: component.into(),
                controls: controls.into_iter().collect(),
            },
        );
        id
    }

    /// Get a rig
    pub fn rig(&self, id: ControlRigId) -> Option<&ControlRigInstance> {
        self.rigs.get(&id)
    }

    /// Remove a control from a rig
    pub fn remove_control(&mut self, rig: ControlRigId, control: &str) -> bool {
        self.rigs
            .get_mut(&rig)
            .is_some_and(|r| r.controls.shift_remove(control).is_some())
    }

    /// Whether a trail object still resolves
    pub fn object_exists(&self, object: &TrailObject) -> bool {
        match object {
            TrailObject::Actor(entity) => self.entities.contains_key(entity),
            TrailObject::Component { entity, component } => self
                .entity(*entity)
                .is_some_and(|e| e.components.contains_key(component)),
            TrailObject::Socket { entity, component, socket } => self
                .entity(*entity)
                .and_then(|e| e.components.get(component))
                .is_some_and(|c| c.sockets.contains_key(socket)),
            TrailObject::Control { rig, control } => self
                .rig(*rig)
                .is_some_and(|r| r.controls.contains_key(control) && self.entities.contains_key(&r.owner)),
        }
    }
}
