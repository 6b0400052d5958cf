// SPDX-License-Identifier: MIT OR Apache-2.0
//! Translation / rotation / scale transforms.
//!
//! Rotations are unit quaternions stored as `(x, y, z, w)`. Composition
//! ignores the shear that non-uniform parent scale would introduce, the same
//! simplification the editor's scene transforms make.

use crate::keyframe::Interpolation;
use serde::{Deserialize, Serialize};

/// A decomposed 3D transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation (x, y, z)
    pub translation: [f64; 3],
    /// Rotation quaternion (x, y, z, w)
    pub rotation: [f64; 4],
    /// Scale
    pub scale: [f64; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// The identity transform
    pub const IDENTITY: Self = Self {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0, 1.0, 1.0],
    };

    /// Pure translation
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Build from translation, euler rotation in degrees (roll, pitch, yaw) and scale
    pub fn from_components(translation: [f64; 3], rotation_degrees: [f64; 3], scale: [f64; 3]) -> Self {
        Self {
            translation,
            rotation: quat_from_euler_degrees(rotation_degrees),
            scale,
        }
    }

    /// Rotation as euler angles in degrees (roll, pitch, yaw)
    pub fn euler_degrees(&self) -> [f64; 3] {
        quat_to_euler_degrees(self.rotation)
    }

    /// Place `self`, expressed relative to `parent`, into `parent`'s space
    pub fn then(&self, parent: &Transform) -> Transform {
        let scaled = [
            self.translation[0] * parent.scale[0],
            self.translation[1] * parent.scale[1],
            self.translation[2] * parent.scale[2],
        ];
        let rotated = quat_rotate(parent.rotation, scaled);
        Transform {
            translation: [
                rotated[0] + parent.translation[0],
                rotated[1] + parent.translation[1],
                rotated[2] + parent.translation[2],
            ],
            rotation: quat_normalize(quat_mul(parent.rotation, self.rotation)),
            scale: [
                self.scale[0] * parent.scale[0],
                self.scale[1] * parent.scale[1],
                self.scale[2] * parent.scale[2],
            ],
        }
    }

    /// Express `self` relative to `parent`; the inverse of [`Transform::then`]
    pub fn relative_to(&self, parent: &Transform) -> Transform {
        let inverse_rotation = quat_conjugate(parent.rotation);
        let delta = [
            self.translation[0] - parent.translation[0],
            self.translation[1] - parent.translation[1],
            self.translation[2] - parent.translation[2],
        ];
        let unrotated = quat_rotate(inverse_rotation, delta);
        Transform {
            translation: [
                safe_div(unrotated[0], parent.scale[0]),
                safe_div(unrotated[1], parent.scale[1]),
                safe_div(unrotated[2], parent.scale[2]),
            ],
            rotation: quat_normalize(quat_mul(inverse_rotation, self.rotation)),
            scale: [
                safe_div(self.scale[0], parent.scale[0]),
                safe_div(self.scale[1], parent.scale[1]),
                safe_div(self.scale[2], parent.scale[2]),
            ],
        }
    }

    /// Transform a point from local space
    pub fn transform_point(&self, point: [f64; 3]) -> [f64; 3] {
        let scaled = [
            point[0] * self.scale[0],
            point[1] * self.scale[1],
            point[2] * self.scale[2],
        ];
        let rotated = quat_rotate(self.rotation, scaled);
        [
            rotated[0] + self.translation[0],
            rotated[1] + self.translation[1],
            rotated[2] + self.translation[2],
        ]
    }

    /// Blend two transforms: lerp translation and scale, slerp rotation
    pub fn blend(a: &Transform, b: &Transform, t: f64) -> Transform {
        Transform {
            translation: Interpolation::lerp_vec3(a.translation, b.translation, t),
            rotation: Interpolation::slerp(a.rotation, b.rotation, t),
            scale: Interpolation::lerp_vec3(a.scale, b.scale, t),
        }
    }

    /// Component-wise comparison within `tolerance`
    pub fn equals(&self, other: &Transform, tolerance: f64) -> bool {
        let close = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance);
        // q and -q are the same rotation
        let negated = other.rotation.map(|c| -c);
        close(&self.translation, &other.translation)
            && close(&self.scale, &other.scale)
            && (close(&self.rotation, &other.rotation) || close(&self.rotation, &negated))
    }
}

fn safe_div(a: f64, b: f64) -> f64 {
    if b.abs() <= f64::EPSILON { 0.0 } else { a / b }
}

fn quat_mul(a: [f64; 4], b: [f64; 4]) -> [f64; 4] {
    [
        a[3] * b[0] + a[0] * b[3] + a[1] * b[2] - a[2] * b[1],
        a[3] * b[1] - a[0] * b[2] + a[1] * b[3] + a[2] * b[0],
        a[3] * b[2] + a[0] * b[1] - a[1] * b[0] + a[2] * b[3],
        a[3] * b[3] - a[0] * b[0] - a[1] * b[1] - a[2] * b[2],
    ]
}

fn quat_conjugate(q: [f64; 4]) -> [f64; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

fn quat_normalize(q: [f64; 4]) -> [f64; 4] {
    let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if len <= f64::EPSILON {
        return Transform::IDENTITY.rotation;
    }
    [q[0] / len, q[1] / len, q[2] / len, q[3] / len]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn quat_rotate(q: [f64; 4], v: [f64; 3]) -> [f64; 3] {
    let axis = [q[0], q[1], q[2]];
    let t = cross(axis, v).map(|c| c * 2.0);
    let c = cross(axis, t);
    [
        v[0] + q[3] * t[0] + c[0],
        v[1] + q[3] * t[1] + c[1],
        v[2] + q[3] * t[2] + c[2],
    ]
}

fn quat_from_euler_degrees(degrees: [f64; 3]) -> [f64; 4] {
    let [roll, pitch, yaw] = degrees.map(|d| d.to_radians() * 0.5);
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();
    [
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
        cr * cp * cy + sr * sp * sy,
    ]
}

fn quat_to_euler_degrees(q: [f64; 4]) -> [f64; 3] {
    let [x, y, z, w] = q;
    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
    let sin_pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let pitch = sin_pitch.asin();
    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
    [roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()]
}
