// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coordinate spaces and per-frame transform resolution.
//!
//! Every session owns a [`SpaceStore`]. Each [`CoordinateSpace`] in it holds
//! one authoritative transform relative to the tracking root, stored either
//! as the forward matrix (space → root) or as its inverse. The other
//! direction is derived on demand and memoized until the next write.
//!
//! Spaces whose pose changes over time carry a [`SpaceRole`] that tells
//! [`SpaceStore::ensure_resolved`] where to pull the current matrix from: the
//! viewer pose, a per-view matrix, or an input source. Resolution happens at
//! most once per [`FrameId`]; a second call in the same frame does nothing.
//! [`SpaceStore::relative_transform`] refuses to compose spaces that were not
//! resolved for the frame being queried.

use alloc::vec::Vec;
use core::fmt;

use crate::frame::FrameId;
use crate::input::{InputSourceId, InputSpaceRole};
use crate::reference::ReferenceSpaceType;
use crate::session::SessionId;
use crate::transform::Transform3d;

/// A handle to a space in a session's [`SpaceStore`].
///
/// The handle records its owning session, so a space can never be resolved
/// against another session's store.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId {
    pub(crate) session: SessionId,
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl SpaceId {
    /// Returns the session that owns this space.
    #[inline]
    #[must_use]
    pub const fn session(self) -> SessionId {
        self.session
    }

    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }
}

impl fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpaceId(s{}:{}@gen{})",
            self.session.index(),
            self.idx,
            self.generation
        )
    }
}

/// What a space tracks, which decides how it is resolved each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpaceRole {
    /// The viewer's head pose.
    Viewer,
    /// One rendered view. The device supplies its view (inverse) matrix.
    View(u32),
    /// The pointing ray of an input source.
    TargetRay(InputSourceId),
    /// The grip pose of an input source.
    Grip(InputSourceId),
    /// A reference space with a fixed baseline.
    Reference(ReferenceSpaceType),
    /// A world-locked anchor.
    Anchor,
}

/// Supplies the live matrices that dynamic spaces resolve against.
pub trait PoseSource {
    /// The viewer pose, space → root.
    fn viewer_pose(&self) -> Option<Transform3d>;

    /// The view matrix (root → view) for view `index`.
    fn view_matrix(&self, index: u32) -> Option<Transform3d>;

    /// The pose of an input source's target-ray or grip space, space → root.
    fn input_pose(&self, source: InputSourceId, role: InputSpaceRole) -> Option<Transform3d>;
}

/// The single authoritative transform of a space, plus a lazily derived
/// opposite direction.
#[derive(Clone, Copy, Debug, PartialEq)]
enum BaseTransform {
    Unset,
    Forward {
        matrix: Transform3d,
        inverse: Option<Transform3d>,
    },
    Inverse {
        matrix: Transform3d,
        forward: Option<Transform3d>,
    },
}

impl BaseTransform {
    fn forward(&mut self) -> Option<Transform3d> {
        match self {
            Self::Unset => None,
            Self::Forward { matrix, .. } => Some(*matrix),
            Self::Inverse { matrix, forward } => {
                if forward.is_none() {
                    *forward = matrix.inverse();
                }
                *forward
            }
        }
    }

    fn inverse(&mut self) -> Option<Transform3d> {
        match self {
            Self::Unset => None,
            Self::Inverse { matrix, .. } => Some(*matrix),
            Self::Forward { matrix, inverse } => {
                if inverse.is_none() {
                    *inverse = matrix.inverse();
                }
                *inverse
            }
        }
    }
}

/// A frame of reference located relative to the tracking root.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateSpace {
    role: SpaceRole,
    base: BaseTransform,
    last_resolved: Option<FrameId>,
}

impl CoordinateSpace {
    /// Creates a space with no transform yet.
    #[must_use]
    pub fn new(role: SpaceRole) -> Self {
        Self {
            role,
            base: BaseTransform::Unset,
            last_resolved: None,
        }
    }

    /// Returns the role tag.
    #[inline]
    #[must_use]
    pub fn role(&self) -> SpaceRole {
        self.role
    }

    /// Returns the frame this space was last resolved for.
    #[inline]
    #[must_use]
    pub fn last_resolved(&self) -> Option<FrameId> {
        self.last_resolved
    }

    /// Stores the space → root matrix, discarding any cached inverse.
    pub fn set_forward(&mut self, matrix: Transform3d) {
        self.base = BaseTransform::Forward {
            matrix,
            inverse: None,
        };
    }

    /// Stores the root → space matrix, discarding any cached forward.
    pub fn set_inverse(&mut self, matrix: Transform3d) {
        self.base = BaseTransform::Inverse {
            matrix,
            forward: None,
        };
    }

    /// Drops the transform. The space stays unresolvable until set again.
    pub fn clear(&mut self) {
        self.base = BaseTransform::Unset;
    }

    /// Returns the space → root matrix, inverting and caching if needed.
    pub fn forward(&mut self) -> Option<Transform3d> {
        self.base.forward()
    }

    /// Returns the root → space matrix, inverting and caching if needed.
    pub fn inverse(&mut self) -> Option<Transform3d> {
        self.base.inverse()
    }

    /// Brings the transform up to date for `frame`.
    ///
    /// Returns `false` without touching `source` if the space was already
    /// resolved for this frame.
    pub fn ensure_resolved(&mut self, source: &dyn PoseSource, frame: FrameId) -> bool {
        if self.last_resolved == Some(frame) {
            return false;
        }
        self.last_resolved = Some(frame);
        match self.role {
            SpaceRole::Viewer => self.store_forward(source.viewer_pose()),
            SpaceRole::View(index) => match source.view_matrix(index) {
                Some(m) if m.is_finite() => self.set_inverse(m),
                _ => self.clear(),
            },
            SpaceRole::TargetRay(id) => {
                self.store_forward(source.input_pose(id, InputSpaceRole::TargetRay));
            }
            SpaceRole::Grip(id) => self.store_forward(source.input_pose(id, InputSpaceRole::Grip)),
            // Static baselines.
            SpaceRole::Reference(_) | SpaceRole::Anchor => {}
        }
        true
    }

    fn store_forward(&mut self, matrix: Option<Transform3d>) {
        match matrix {
            Some(m) if m.is_finite() => self.set_forward(m),
            _ => self.clear(),
        }
    }
}

/// Anything that names a space and an origin offset on top of it.
///
/// Implemented by raw [`SpaceId`]s (no offset) and by
/// [`ReferenceSpace`](crate::reference::ReferenceSpace).
pub trait AsSpace {
    /// The underlying coordinate space.
    fn space_id(&self) -> SpaceId;

    /// Offset applied on top of the underlying space.
    fn origin_offset(&self) -> Transform3d {
        Transform3d::IDENTITY
    }
}

impl AsSpace for SpaceId {
    fn space_id(&self) -> SpaceId {
        *self
    }
}

/// Generational storage for one session's spaces.
#[derive(Debug)]
pub struct SpaceStore {
    session: SessionId,
    spaces: Vec<CoordinateSpace>,
    generation: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
}

impl SpaceStore {
    /// Creates an empty store owned by `session`.
    #[must_use]
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            spaces: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Creates a new space and returns its handle.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "a session never holds anywhere near u32::MAX spaces"
    )]
    pub fn create(&mut self, role: SpaceRole) -> SpaceId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.spaces[i] = CoordinateSpace::new(role);
            self.alive[i] = true;
            idx
        } else {
            self.spaces.push(CoordinateSpace::new(role));
            self.generation.push(0);
            self.alive.push(true);
            (self.spaces.len() - 1) as u32
        };
        SpaceId {
            session: self.session,
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a space, freeing its slot for reuse.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or belongs to another session.
    pub fn destroy(&mut self, id: SpaceId) {
        self.validate(id);
        let i = id.idx as usize;
        self.alive[i] = false;
        // Bump generation so old handles immediately fail validation.
        self.generation[i] += 1;
        self.free_list.push(id.idx);
    }

    /// Returns whether the handle refers to a live space in this store.
    #[must_use]
    pub fn is_alive(&self, id: SpaceId) -> bool {
        id.session == self.session
            && (id.idx as usize) < self.spaces.len()
            && self.alive[id.idx as usize]
            && self.generation[id.idx as usize] == id.generation
    }

    /// Returns the number of live spaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// Returns whether the store has no live spaces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the space behind `id`, if it is alive.
    #[must_use]
    pub fn get(&self, id: SpaceId) -> Option<&CoordinateSpace> {
        self.is_alive(id).then(|| &self.spaces[id.idx as usize])
    }

    /// Returns the space behind `id` mutably, if it is alive.
    pub fn get_mut(&mut self, id: SpaceId) -> Option<&mut CoordinateSpace> {
        if self.is_alive(id) {
            Some(&mut self.spaces[id.idx as usize])
        } else {
            None
        }
    }

    /// Resolves `id` for `frame`. See [`CoordinateSpace::ensure_resolved`].
    ///
    /// Returns `false` if the space is dead or was already resolved.
    pub fn ensure_resolved(&mut self, id: SpaceId, source: &dyn PoseSource, frame: FrameId) -> bool {
        self.get_mut(id)
            .is_some_and(|space| space.ensure_resolved(source, frame))
    }

    /// Returns the pose of `to` expressed in `from`:
    /// `inverse(from.forward) * to.forward`.
    ///
    /// Returns `None` if either space is dead, has no transform, or was not
    /// resolved for `frame`.
    pub fn relative_transform(
        &mut self,
        from: SpaceId,
        to: SpaceId,
        frame: FrameId,
    ) -> Option<Transform3d> {
        let to_forward = self.resolved_mut(to, frame)?.forward()?;
        let from_inverse = self.resolved_mut(from, frame)?.inverse()?;
        Some(from_inverse * to_forward)
    }

    /// Composes offsets on both sides of [`relative_transform`](Self::relative_transform).
    pub fn relative_pose(
        &mut self,
        base: &dyn AsSpace,
        target: &dyn AsSpace,
        frame: FrameId,
    ) -> Option<Transform3d> {
        let rel = self.relative_transform(base.space_id(), target.space_id(), frame)?;
        let base_offset_inv = base.origin_offset().inverse()?;
        Some(base_offset_inv * rel * target.origin_offset())
    }

    fn resolved_mut(&mut self, id: SpaceId, frame: FrameId) -> Option<&mut CoordinateSpace> {
        self.get_mut(id)
            .filter(|space| space.last_resolved == Some(frame))
    }

    fn validate(&self, id: SpaceId) {
        assert!(
            self.is_alive(id),
            "stale or foreign space handle: {id:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    const EPS: f64 = 1e-9;

    #[derive(Default)]
    struct Poses {
        viewer: Option<Transform3d>,
        views: Vec<Transform3d>,
        viewer_reads: Cell<u32>,
    }

    impl PoseSource for Poses {
        fn viewer_pose(&self) -> Option<Transform3d> {
            self.viewer_reads.set(self.viewer_reads.get() + 1);
            self.viewer
        }

        fn view_matrix(&self, index: u32) -> Option<Transform3d> {
            self.views.get(index as usize).copied()
        }

        fn input_pose(&self, _: InputSourceId, _: InputSpaceRole) -> Option<Transform3d> {
            None
        }
    }

    fn store() -> SpaceStore {
        SpaceStore::new(SessionId(0))
    }

    #[test]
    fn setting_one_direction_invalidates_the_other() {
        let mut space = CoordinateSpace::new(SpaceRole::Anchor);
        space.set_forward(Transform3d::from_translation(1.0, 0.0, 0.0));
        assert_eq!(space.inverse().unwrap().translation(), [-1.0, 0.0, 0.0]);
        space.set_inverse(Transform3d::from_translation(0.0, 2.0, 0.0));
        assert_eq!(space.forward().unwrap().translation(), [0.0, -2.0, 0.0]);
        space.clear();
        assert!(space.forward().is_none() && space.inverse().is_none(), "cleared");
    }

    #[test]
    fn resolution_is_idempotent_per_frame() {
        let poses = Poses {
            viewer: Some(Transform3d::from_translation(0.0, 1.6, 0.0)),
            ..Poses::default()
        };
        let mut spaces = store();
        let viewer = spaces.create(SpaceRole::Viewer);
        assert!(spaces.ensure_resolved(viewer, &poses, FrameId(1)), "first resolve");
        assert!(!spaces.ensure_resolved(viewer, &poses, FrameId(1)), "second resolve");
        assert_eq!(poses.viewer_reads.get(), 1, "device read once per frame");
        assert!(spaces.ensure_resolved(viewer, &poses, FrameId(2)), "next frame");
        assert_eq!(poses.viewer_reads.get(), 2, "re-read on the next frame");
    }

    #[test]
    fn unresolved_side_yields_none() {
        let poses = Poses {
            viewer: Some(Transform3d::IDENTITY),
            ..Poses::default()
        };
        let mut spaces = store();
        let viewer = spaces.create(SpaceRole::Viewer);
        let local = spaces.create(SpaceRole::Reference(ReferenceSpaceType::Local));
        spaces.get_mut(local).unwrap().set_inverse(Transform3d::IDENTITY);
        spaces.ensure_resolved(viewer, &poses, FrameId(3));
        assert!(spaces.relative_transform(local, viewer, FrameId(3)).is_none(), "local unresolved");
        spaces.ensure_resolved(local, &poses, FrameId(3));
        assert!(spaces.relative_transform(local, viewer, FrameId(3)).is_some(), "both resolved");
        assert!(spaces.relative_transform(local, viewer, FrameId(4)).is_none(), "stale frame");
    }

    #[test]
    fn relative_transforms_are_mutually_inverse() {
        let poses = Poses {
            viewer: Some(
                Transform3d::from_translation(0.3, 1.7, -0.2) * Transform3d::from_rotation_y(0.6),
            ),
            views: alloc::vec![Transform3d::from_rotation_x(0.2) * Transform3d::from_translation(0.0, -1.6, 0.5)],
            ..Poses::default()
        };
        let mut spaces = store();
        let a = spaces.create(SpaceRole::Viewer);
        let b = spaces.create(SpaceRole::View(0));
        let frame = FrameId(9);
        spaces.ensure_resolved(a, &poses, frame);
        spaces.ensure_resolved(b, &poses, frame);
        let ab = spaces.relative_transform(a, b, frame).unwrap();
        let ba = spaces.relative_transform(b, a, frame).unwrap();
        assert!((ab * ba).approx_eq(&Transform3d::IDENTITY, EPS), "{:?}", ab * ba);
    }

    #[test]
    fn missing_view_matrix_clears_the_space() {
        let poses = Poses::default();
        let mut spaces = store();
        let view = spaces.create(SpaceRole::View(4));
        spaces.get_mut(view).unwrap().set_inverse(Transform3d::IDENTITY);
        spaces.ensure_resolved(view, &poses, FrameId(1));
        assert!(spaces.get_mut(view).unwrap().forward().is_none(), "no matrix this frame");
    }

    #[test]
    fn destroyed_handles_go_stale() {
        let mut spaces = store();
        let a = spaces.create(SpaceRole::Anchor);
        spaces.destroy(a);
        assert!(!spaces.is_alive(a), "destroyed");
        let b = spaces.create(SpaceRole::Anchor);
        assert_eq!(a.index(), b.index(), "slot reused");
        assert!(spaces.is_alive(b) && !spaces.is_alive(a), "generation guards reuse");
        assert_eq!(spaces.len(), 1);
    }

    #[test]
    fn foreign_handles_are_not_alive() {
        let mut mine = store();
        let mut theirs = SpaceStore::new(SessionId(1));
        let _ = mine.create(SpaceRole::Viewer);
        let other = theirs.create(SpaceRole::Viewer);
        assert!(!mine.is_alive(other), "handle from another session");
    }

    #[test]
    #[should_panic(expected = "stale or foreign space handle")]
    fn destroying_twice_panics() {
        let mut spaces = store();
        let a = spaces.create(SpaceRole::Anchor);
        spaces.destroy(a);
        spaces.destroy(a);
    }
}
