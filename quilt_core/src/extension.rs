// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator interfaces for optional world-understanding features.
//!
//! Quilt does not detect planes, estimate lighting, cast rays against the
//! environment or persist anchors itself. These traits are the seams where a
//! device crate plugs those capabilities in. The runtime only handles the
//! parts that touch its own data model: turning rays into root coordinates
//! and turning stored anchor matrices into spaces.

use alloc::string::String;
use alloc::vec::Vec;

use kurbo::Point;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::space::{AsSpace, SpaceId, SpaceRole, SpaceStore};
use crate::transform::Transform3d;

/// A ray with a unit-length direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    origin: [f64; 3],
    direction: [f64; 3],
}

impl Default for Ray {
    /// Starts at the origin and points down `-Z`.
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            direction: [0.0, 0.0, -1.0],
        }
    }
}

impl Ray {
    /// Creates a ray, normalizing `direction`. A zero or non-finite
    /// direction falls back to `-Z`.
    #[must_use]
    pub fn new(origin: [f64; 3], direction: [f64; 3]) -> Self {
        let [x, y, z] = direction;
        let len = (x * x + y * y + z * z).sqrt();
        let direction = if len > 0.0 && len.is_finite() {
            [x / len, y / len, z / len]
        } else {
            [0.0, 0.0, -1.0]
        };
        Self { origin, direction }
    }

    /// Start point.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Unit direction.
    #[inline]
    #[must_use]
    pub const fn direction(&self) -> [f64; 3] {
        self.direction
    }

    /// The rigid transform that maps the default ray onto this one: a
    /// rotation taking `-Z` to the direction, then a translation to the
    /// origin.
    #[must_use]
    pub fn matrix(&self) -> Transform3d {
        let [ox, oy, oz] = self.origin;
        let translation = Transform3d::from_translation(ox, oy, oz);
        let [dx, dy, dz] = self.direction;
        // cos of the angle between -Z and d.
        let cos = -dz;
        if cos >= 1.0 - 1e-12 {
            return translation;
        }
        if cos <= -1.0 + 1e-12 {
            return translation * Transform3d::from_rotation_y(core::f64::consts::PI);
        }
        // Axis (-Z) x d.
        let axis = [dy, -dx, 0.0];
        match Transform3d::from_axis_angle(axis, cos.acos()) {
            Some(rotation) => translation * rotation,
            None => translation,
        }
    }
}

/// An active request to cast a ray from a space every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitTestSource {
    space: SpaceId,
    origin_offset: Transform3d,
    offset_ray: Ray,
    active: bool,
}

impl HitTestSource {
    pub(crate) fn new(space: SpaceId, origin_offset: Transform3d, offset_ray: Ray) -> Self {
        Self {
            space,
            origin_offset,
            offset_ray,
            active: true,
        }
    }

    /// The space the ray is cast from.
    #[must_use]
    pub fn space(&self) -> SpaceId {
        self.space
    }

    /// Offset of the requesting reference space, if any.
    #[must_use]
    pub fn origin_offset(&self) -> Transform3d {
        self.origin_offset
    }

    /// The ray in the space's coordinates.
    #[must_use]
    pub fn offset_ray(&self) -> Ray {
        self.offset_ray
    }

    /// Whether the source still produces results.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stops the source. Later hit tests return nothing.
    pub fn cancel(&mut self) {
        self.active = false;
    }
}

/// Casts rays against the real world.
pub trait HitTestProvider {
    /// Returns hit poses along `ray`, nearest first, relative to the
    /// tracking root.
    fn hit_test(&self, ray: &Ray) -> Vec<Transform3d>;
}

/// A detected real-world surface.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedPlane {
    /// Plane pose, plane → root. The plane lies in its local XZ plane.
    pub pose: Transform3d,
    /// Outline in the plane's XZ coordinates.
    pub polygon: Vec<Point>,
    /// Whether the plane is horizontal.
    pub horizontal: bool,
}

/// Reports surfaces detected in the environment.
pub trait PlaneDetector {
    /// Returns the currently known planes.
    fn detected_planes(&self) -> Vec<DetectedPlane>;
}

/// An estimate of the real-world lighting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LightEstimate {
    /// Dominant light direction, pointing toward the light.
    pub primary_direction: [f64; 3],
    /// Dominant light intensity, linear RGB.
    pub primary_intensity: [f64; 3],
    /// Order-2 spherical harmonics of the ambient light, linear RGB.
    pub spherical_harmonics: [[f64; 3]; 9],
}

/// Estimates real-world lighting.
pub trait LightEstimator {
    /// The latest estimate, if one is available.
    fn light_estimate(&self) -> Option<LightEstimate>;
}

/// External storage for anchors, keyed by opaque handles.
pub trait AnchorStore {
    /// Looks up the anchor pose (anchor → root) stored under `handle`.
    fn load(&self, handle: &str) -> Option<Transform3d>;

    /// Stores an anchor pose and returns its new handle.
    fn store(&mut self, pose: Transform3d) -> String;

    /// Forgets `handle`. Returns whether it existed.
    fn remove(&mut self, handle: &str) -> bool;
}

/// A world-locked space backed by a stored pose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Anchor {
    space: SpaceId,
    handle: String,
}

impl Anchor {
    pub(crate) fn create(spaces: &mut SpaceStore, pose: Transform3d, handle: String) -> Self {
        let space = spaces.create(SpaceRole::Anchor);
        if let Some(s) = spaces.get_mut(space) {
            s.set_forward(pose);
        }
        Self { space, handle }
    }

    /// The anchor's space.
    #[must_use]
    pub fn space(&self) -> SpaceId {
        self.space
    }

    /// The handle it is persisted under.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl AsSpace for Anchor {
    fn space_id(&self) -> SpaceId {
        self.space
    }
}
