// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference spaces: coordinate spaces with a composable origin offset.

use crate::error::SessionError;
use crate::feature::Feature;
use crate::frame::FrameId;
use crate::rigid::RigidTransform;
use crate::space::{AsSpace, SpaceId, SpaceRole, SpaceStore};
use crate::transform::Transform3d;

/// Eye height assumed when a floor-aligned space has no device-supplied
/// baseline, in meters.
pub const EMULATED_EYE_HEIGHT: f64 = 1.6;

/// The kinds of reference space a session can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceType {
    /// Follows the viewer's head.
    Viewer,
    /// Origin near the viewer's starting position.
    Local,
    /// Origin on the floor below the viewer's starting position.
    LocalFloor,
    /// Floor origin with a bounded walkable area.
    BoundedFloor,
    /// No fixed origin, for large-scale tracking.
    Unbounded,
}

impl ReferenceSpaceType {
    /// The session feature that must be enabled to request this type.
    #[must_use]
    pub const fn feature(self) -> Feature {
        match self {
            Self::Viewer => Feature::Viewer,
            Self::Local => Feature::Local,
            Self::LocalFloor => Feature::LocalFloor,
            Self::BoundedFloor => Feature::BoundedFloor,
            Self::Unbounded => Feature::Unbounded,
        }
    }

    /// Whether the origin sits on the floor.
    #[must_use]
    pub const fn is_floor_aligned(self) -> bool {
        matches!(self, Self::LocalFloor | Self::BoundedFloor)
    }
}

/// A tracked coordinate space viewed through an origin offset.
///
/// Reference spaces are plain values. [`derive_offset`](Self::derive_offset)
/// returns a new value over the same underlying space and never changes the
/// one it was called on, so any number of independent offset chains can hang
/// off one tracked root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceSpace {
    space: SpaceId,
    kind: ReferenceSpaceType,
    origin_offset: Transform3d,
}

impl ReferenceSpace {
    pub(crate) fn new(space: SpaceId, kind: ReferenceSpaceType) -> Self {
        Self {
            space,
            kind,
            origin_offset: Transform3d::IDENTITY,
        }
    }

    /// Creates the underlying space for `kind` in `spaces` and wraps it.
    ///
    /// `device_transform` is the device's frame-of-reference transform, used
    /// as the space's inverse baseline. Without one, floor-aligned types
    /// emulate [`EMULATED_EYE_HEIGHT`] and other types sit at the root.
    pub(crate) fn create(
        spaces: &mut SpaceStore,
        kind: ReferenceSpaceType,
        device_transform: Option<Transform3d>,
    ) -> Result<Self, SessionError> {
        if kind == ReferenceSpaceType::BoundedFloor {
            return Err(if device_transform.is_none() {
                SessionError::MissingFloorTransform
            } else {
                SessionError::BoundedFloorUnavailable
            });
        }
        let baseline = match device_transform {
            Some(m) => m,
            None if kind.is_floor_aligned() => {
                Transform3d::from_translation(0.0, EMULATED_EYE_HEIGHT, 0.0)
            }
            None => Transform3d::IDENTITY,
        };
        let space = spaces.create(SpaceRole::Reference(kind));
        if let Some(s) = spaces.get_mut(space) {
            s.set_inverse(baseline);
        }
        Ok(Self::new(space, kind))
    }

    /// Returns the reference-space type.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ReferenceSpaceType {
        self.kind
    }

    /// Returns the underlying coordinate space.
    #[inline]
    #[must_use]
    pub const fn space(&self) -> SpaceId {
        self.space
    }

    /// Returns the offset applied on top of the underlying space.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> Transform3d {
        self.origin_offset
    }

    /// Returns a reference space over the same underlying space whose origin
    /// is moved by `extra`, expressed in this space.
    #[must_use]
    pub fn derive_offset(&self, extra: &RigidTransform) -> Self {
        Self {
            origin_offset: self.origin_offset * extra.matrix(),
            ..*self
        }
    }

    /// Returns the pose of `target` in this space for `frame`:
    /// `inverse(offset) * relative_transform(target)`, with the target's own
    /// offset applied.
    ///
    /// Both sides must already be resolved for `frame`.
    pub fn relative_transform(
        &self,
        spaces: &mut SpaceStore,
        target: &dyn AsSpace,
        frame: FrameId,
    ) -> Option<Transform3d> {
        spaces.relative_pose(self, target, frame)
    }
}

impl AsSpace for ReferenceSpace {
    fn space_id(&self) -> SpaceId {
        self.space
    }

    fn origin_offset(&self) -> Transform3d {
        self.origin_offset
    }
}
