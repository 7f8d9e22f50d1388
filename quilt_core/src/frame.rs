// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frames: the per-tick (or per-event) window in which poses can be queried.
//!
//! A [`Frame`] borrows its session and the device for exactly the duration
//! of one callback dispatch, so it cannot outlive the tick that produced it.
//! It also carries an `active` flag that the runtime clears once dispatch
//! completes; every query checks it and fails with
//! [`SessionError::FrameInactive`] afterwards.

use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::callbacks::FrameHandle;
use crate::device::Device;
use crate::error::{CallbackResult, SessionError};
use crate::extension::{Anchor, AnchorStore, HitTestProvider, HitTestSource, Ray};
use crate::feature::Feature;
use crate::input::{InputSourceId, InputSpaceRole};
use crate::multiview::CameraArray;
use crate::reference::ReferenceSpace;
use crate::render_state::RenderStatePatch;
use crate::rigid::RigidTransform;
use crate::session::{Session, SessionMode};
use crate::space::{AsSpace, PoseSource, SpaceRole};
use crate::time::HostTime;
use crate::transform::Transform3d;

/// Identifies one frame. Spaces are resolved at most once per frame id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u64);

impl FrameId {
    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self.0)
    }
}

/// Why a frame was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// A scheduled animation frame.
    Animation,
    /// A transient frame delivered with an input event.
    Input,
}

/// Which eye a view is rendered for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Eye {
    /// Not eye-specific (mono or light-field views).
    #[default]
    None,
    /// Left eye.
    Left,
    /// Right eye.
    Right,
}

/// One view to render this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct View {
    /// Eye this view belongs to.
    pub eye: Eye,
    /// Position among the session's views.
    pub index: u32,
    /// Camera pose in the queried reference space.
    pub transform: RigidTransform,
    /// Projection matrix.
    pub projection: Transform3d,
}

/// A pose and whether its position is estimated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Position and orientation.
    pub transform: RigidTransform,
    /// True if the position is estimated rather than tracked.
    pub emulated_position: bool,
}

/// The viewer pose plus one [`View`] per rendered view.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerPose {
    /// Pose of the viewer.
    pub pose: Pose,
    /// Views in index order.
    pub views: Vec<View>,
}

/// Reads live matrices from the device, or from the derived camera array
/// for light-field sessions.
struct DevicePoses<'a> {
    device: &'a dyn Device,
    mode: SessionMode,
    cameras: Option<&'a CameraArray>,
}

impl PoseSource for DevicePoses<'_> {
    fn viewer_pose(&self) -> Option<Transform3d> {
        match self.cameras {
            Some(cameras) => Some(cameras.base_pose()),
            None => self.device.base_pose_matrix(self.mode),
        }
    }

    fn view_matrix(&self, index: u32) -> Option<Transform3d> {
        match self.cameras {
            Some(cameras) => cameras.view_matrix(index),
            None => self.device.base_view_matrix(self.mode, index),
        }
    }

    fn input_pose(&self, source: InputSourceId, role: InputSpaceRole) -> Option<Transform3d> {
        self.device.input_pose(source, role)
    }
}

/// A window onto one session at one point in time.
pub struct Frame<'a> {
    id: FrameId,
    kind: FrameKind,
    active: bool,
    pub(crate) session: &'a mut Session,
    device: &'a dyn Device,
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("active", &self.active)
            .field("session", &self.session.id())
            .finish_non_exhaustive()
    }
}

impl<'a> Frame<'a> {
    pub(crate) fn new(
        id: FrameId,
        kind: FrameKind,
        session: &'a mut Session,
        device: &'a dyn Device,
    ) -> Self {
        Self {
            id,
            kind,
            active: true,
            session,
            device,
        }
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// Returns the frame id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Returns why the frame was created.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Whether the frame may still be queried.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the session this frame belongs to.
    #[must_use]
    pub fn session(&self) -> &Session {
        self.session
    }

    fn check_active(&self) -> Result<(), SessionError> {
        if self.active {
            Ok(())
        } else {
            Err(SessionError::FrameInactive)
        }
    }

    fn check_owned(&self, space: &dyn AsSpace) -> Result<(), SessionError> {
        if space.space_id().session() == self.session.id() {
            Ok(())
        } else {
            Err(SessionError::ForeignSpace)
        }
    }

    /// Returns the viewer pose and every view, relative to `reference`.
    ///
    /// Only available on animation frames. Returns `Ok(None)` when tracking
    /// is lost this frame.
    pub fn viewer_pose(
        &mut self,
        reference: &ReferenceSpace,
    ) -> Result<Option<ViewerPose>, SessionError> {
        self.check_active()?;
        if self.kind != FrameKind::Animation {
            return Err(SessionError::NotAnimationFrame);
        }
        self.check_owned(reference)?;

        let frame = self.id;
        let session = &mut *self.session;
        let poses = DevicePoses {
            device: self.device,
            mode: session.mode,
            cameras: session.cameras.as_ref(),
        };
        let viewer = session.viewer;
        session.spaces.ensure_resolved(viewer.space(), &poses, frame);
        session.spaces.ensure_resolved(reference.space(), &poses, frame);
        let Some(viewer_matrix) = session.spaces.relative_pose(reference, &viewer, frame) else {
            return Ok(None);
        };

        let mut views = Vec::with_capacity(session.views.len());
        for (index, slot) in (0_u32..).zip(session.views.iter()) {
            session.spaces.ensure_resolved(slot.space, &poses, frame);
            let Some(m) = session.spaces.relative_pose(reference, &slot.space, frame) else {
                return Ok(None);
            };
            let projection = match session.cameras.as_ref() {
                Some(cameras) => cameras.projection(index).unwrap_or_default(),
                None => self.device.projection_matrix(session.id, index),
            };
            views.push(View {
                eye: slot.eye,
                index,
                transform: RigidTransform::from_matrix(&m),
                projection,
            });
        }

        Ok(Some(ViewerPose {
            pose: Pose {
                transform: RigidTransform::from_matrix(&viewer_matrix),
                emulated_position: self.device.is_position_emulated(),
            },
            views,
        }))
    }

    /// Returns the pose of `space` relative to `base`.
    ///
    /// Returns `Ok(None)` if either side cannot be located this frame.
    pub fn pose(
        &mut self,
        space: &dyn AsSpace,
        base: &dyn AsSpace,
    ) -> Result<Option<Pose>, SessionError> {
        self.check_active()?;
        self.check_owned(space)?;
        self.check_owned(base)?;

        let frame = self.id;
        let session = &mut *self.session;
        let poses = DevicePoses {
            device: self.device,
            mode: session.mode,
            cameras: session.cameras.as_ref(),
        };
        session.spaces.ensure_resolved(space.space_id(), &poses, frame);
        session.spaces.ensure_resolved(base.space_id(), &poses, frame);
        let emulated = matches!(
            session.spaces.get(space.space_id()).map(|s| s.role()),
            Some(SpaceRole::Viewer | SpaceRole::View(_))
        ) && self.device.is_position_emulated();
        Ok(session
            .spaces
            .relative_pose(base, space, frame)
            .map(|m| Pose {
                transform: RigidTransform::from_matrix(&m),
                emulated_position: emulated,
            }))
    }

    /// Returns where `view` is drawn within the active render target.
    ///
    /// `Ok(None)` when no target is attached.
    pub fn viewport(&self, view: &View) -> Result<Option<Rect>, SessionError> {
        self.check_active()?;
        let Some(target) = self.session.render_state.target else {
            return Ok(None);
        };
        Ok(match self.session.cameras.as_ref() {
            Some(cameras) => cameras.viewport(view.index),
            None => self.device.viewport(self.session.id, view.index, &target),
        })
    }

    /// Queues a callback for the next tick.
    pub fn request_animation_frame<F>(&mut self, callback: F) -> Result<FrameHandle, SessionError>
    where
        F: FnMut(HostTime, &mut Frame<'_>) -> CallbackResult + 'static,
    {
        self.session.request_animation_frame(callback)
    }

    /// Cancels a queued callback, including one later in this tick's
    /// dispatch.
    pub fn cancel_animation_frame(&mut self, handle: FrameHandle) {
        self.session.cancel_animation_frame(handle);
    }

    /// Patches the render state for the next tick.
    pub fn update_render_state(&mut self, patch: RenderStatePatch) -> Result<(), SessionError> {
        self.session.update_render_state(patch)
    }

    /// Creates an anchor at `pose` relative to `base` and persists it in
    /// `store`.
    ///
    /// `Ok(None)` if `base` cannot be located this frame.
    pub fn create_anchor(
        &mut self,
        pose: &RigidTransform,
        base: &dyn AsSpace,
        store: &mut dyn AnchorStore,
    ) -> Result<Option<Anchor>, SessionError> {
        self.check_active()?;
        if !self.session.features.contains(Feature::Anchors) {
            return Err(SessionError::FeatureUnavailable(Feature::Anchors));
        }
        self.check_owned(base)?;

        let frame = self.id;
        let session = &mut *self.session;
        let poses = DevicePoses {
            device: self.device,
            mode: session.mode,
            cameras: session.cameras.as_ref(),
        };
        session.spaces.ensure_resolved(base.space_id(), &poses, frame);
        let Some(base_forward) = session
            .spaces
            .get_mut(base.space_id())
            .and_then(|s| s.forward())
        else {
            return Ok(None);
        };
        let matrix = base_forward * base.origin_offset() * pose.matrix();
        let handle = store.store(matrix);
        Ok(Some(Anchor::create(&mut session.spaces, matrix, handle)))
    }

    /// Deletes an anchor. See [`Session::delete_anchor`].
    pub fn delete_anchor(
        &mut self,
        anchor: Anchor,
        store: &mut dyn AnchorStore,
    ) -> Result<bool, SessionError> {
        self.session.delete_anchor(anchor, store)
    }

    /// Casts `source`'s ray and returns the hits, as poses relative to the
    /// tracking root.
    pub fn hit_test(
        &mut self,
        source: &HitTestSource,
        provider: &dyn HitTestProvider,
    ) -> Result<Vec<Transform3d>, SessionError> {
        self.check_active()?;
        if !source.is_active() {
            return Ok(Vec::new());
        }
        if source.space().session() != self.session.id() {
            return Err(SessionError::ForeignSpace);
        }

        let frame = self.id;
        let session = &mut *self.session;
        let poses = DevicePoses {
            device: self.device,
            mode: session.mode,
            cameras: session.cameras.as_ref(),
        };
        session.spaces.ensure_resolved(source.space(), &poses, frame);
        let Some(origin) = session.spaces.get_mut(source.space()).and_then(|s| s.forward()) else {
            return Ok(Vec::new());
        };
        let cast = origin * source.origin_offset();
        let ray = Ray::new(
            cast.transform_point(source.offset_ray().origin()),
            cast.transform_vector(source.offset_ray().direction()),
        );
        Ok(provider.hit_test(&ray))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ViewArrangement;
    use crate::session::{SessionId, SessionMode};
    use crate::testing::ScriptedDevice;

    fn session(mode: SessionMode, arrangement: ViewArrangement) -> Session {
        Session::new(SessionId(0), mode, mode.required_features(), arrangement)
    }

    #[test]
    fn inactive_frames_refuse_queries() {
        let device = ScriptedDevice::default();
        let mut s = session(SessionMode::Inline, ViewArrangement::Mono);
        let viewer = s.viewer_space();
        let mut frame = Frame::new(FrameId(1), FrameKind::Animation, &mut s, &device);
        assert!(frame.viewer_pose(&viewer).is_ok(), "active frame");
        frame.deactivate();
        assert_eq!(frame.viewer_pose(&viewer).unwrap_err(), SessionError::FrameInactive);
        assert_eq!(frame.pose(&viewer, &viewer).unwrap_err(), SessionError::FrameInactive);
    }

    #[test]
    fn input_frames_have_no_viewer_pose() {
        let device = ScriptedDevice::default();
        let mut s = session(SessionMode::Inline, ViewArrangement::Mono);
        let viewer = s.viewer_space();
        let mut frame = Frame::new(FrameId(1), FrameKind::Input, &mut s, &device);
        assert_eq!(
            frame.viewer_pose(&viewer).unwrap_err(),
            SessionError::NotAnimationFrame
        );
        assert!(frame.pose(&viewer, &viewer).unwrap().is_some(), "pose still works");
    }

    #[test]
    fn stereo_views_straddle_the_viewer() {
        let device = ScriptedDevice {
            head: Transform3d::from_translation(0.0, 1.5, 0.0),
            ..ScriptedDevice::default()
        };
        let mut s = session(SessionMode::ImmersiveVr, ViewArrangement::Stereo);
        let viewer = s.viewer_space();
        let mut frame = Frame::new(FrameId(1), FrameKind::Animation, &mut s, &device);
        let pose = frame.viewer_pose(&viewer).unwrap().unwrap();
        assert_eq!(pose.views.len(), 2);
        let [lx, ly, _] = pose.views[0].transform.position();
        let [rx, _, _] = pose.views[1].transform.position();
        assert!(lx < 0.0 && rx > 0.0, "left {lx}, right {rx}");
        assert!(ly.abs() < 1e-9, "views are level with the viewer");
        assert_eq!(pose.views[0].eye, Eye::Left);
        let p = pose.pose.transform.position();
        assert!(p.iter().all(|c| c.abs() < 1e-9), "viewer in its own space: {p:?}");
    }

    #[test]
    fn foreign_spaces_are_rejected() {
        let device = ScriptedDevice::default();
        let mut mine = session(SessionMode::Inline, ViewArrangement::Mono);
        let theirs = Session::new(
            SessionId(1),
            SessionMode::Inline,
            SessionMode::Inline.required_features(),
            ViewArrangement::Mono,
        );
        let mut frame = Frame::new(FrameId(1), FrameKind::Animation, &mut mine, &device);
        assert_eq!(
            frame.viewer_pose(&theirs.viewer_space()).unwrap_err(),
            SessionError::ForeignSpace
        );
    }

    #[test]
    fn viewport_needs_a_target() {
        let device = ScriptedDevice::default();
        let mut s = session(SessionMode::Inline, ViewArrangement::Mono);
        let viewer = s.viewer_space();
        let frame_view = {
            let mut frame = Frame::new(FrameId(1), FrameKind::Animation, &mut s, &device);
            let pose = frame.viewer_pose(&viewer).unwrap().unwrap();
            assert_eq!(frame.viewport(&pose.views[0]).unwrap(), None);
            pose.views[0]
        };
        s.render_state.target = Some(s.create_render_target(crate::render_state::SurfaceId(1)));
        let frame = Frame::new(FrameId(2), FrameKind::Animation, &mut s, &device);
        assert!(frame.viewport(&frame_view).unwrap().is_some(), "device viewport");
    }

    #[test]
    fn anchors_are_placed_relative_to_their_base() {
        let device = ScriptedDevice::default();
        let mut store = crate::testing::MemoryAnchors::default();
        let features = SessionMode::Inline.required_features().with(Feature::Anchors);
        let mut s = Session::new(SessionId(0), SessionMode::Inline, features, ViewArrangement::Mono);
        let viewer = s.viewer_space();
        let mut frame = Frame::new(FrameId(1), FrameKind::Animation, &mut s, &device);
        let ahead = RigidTransform::new([0.0, 0.0, -1.0], [0.0, 0.0, 0.0, 1.0]);
        let anchor = frame
            .create_anchor(&ahead, &viewer, &mut store)
            .unwrap()
            .expect("viewer is tracked");
        let stored = store.load(anchor.handle()).expect("persisted");
        assert_eq!(stored.translation(), [0.0, 1.6, -1.0]);

        let space = anchor.space();
        assert_eq!(frame.delete_anchor(anchor, &mut store), Ok(true));
        assert!(store.load("anchor-1").is_none(), "forgotten");
        assert!(!frame.session().spaces.is_alive(space), "space released");
    }

    #[test]
    fn anchors_need_the_feature() {
        let device = ScriptedDevice::default();
        let mut store = crate::testing::MemoryAnchors::default();
        let mut s = session(SessionMode::Inline, ViewArrangement::Mono);
        let viewer = s.viewer_space();
        let mut frame = Frame::new(FrameId(1), FrameKind::Animation, &mut s, &device);
        assert_eq!(
            frame
                .create_anchor(&RigidTransform::IDENTITY, &viewer, &mut store)
                .unwrap_err(),
            SessionError::FeatureUnavailable(Feature::Anchors)
        );
    }
}
