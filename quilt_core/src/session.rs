// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sessions: one application's connection to the device.
//!
//! A [`Session`] owns everything that is per-application: its spaces, its
//! view spaces, its callback queue, its render state and its listeners. The
//! [`Runtime`](crate::runtime::Runtime) owns the sessions and drives their
//! state machine:
//!
//! ```text
//!            competing immersive session starts
//!   Active ───────────────────────────────────▶ Suspended
//!     ▲  ◀─────────────────────────────────────    │
//!     │        blocking session ends               │
//!     │                                            │
//!     └────────────▶ Ended ◀───────────────────────┘
//!          end_session / device termination
//! ```
//!
//! Only `Active` sessions tick. `Ended` is terminal.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::callbacks::{CallbackQueue, FrameHandle};
use crate::device::{TickRequest, ViewArrangement};
use crate::error::{CallbackResult, SessionError};
use crate::event::{ListenerId, ListenerList, SessionEvent};
use crate::extension::{Anchor, AnchorStore, HitTestSource, Ray};
use crate::feature::{Feature, FeatureSet};
use crate::frame::{Eye, Frame};
use crate::input::{InputRouter, InputSourceSet, TrackedInput};
use crate::multiview::{CameraArray, CameraUpdate};
use crate::reference::{ReferenceSpace, ReferenceSpaceType};
use crate::render_state::{RenderState, RenderStatePatch, RenderTarget, SurfaceId};
use crate::space::{AsSpace, SpaceId, SpaceRole, SpaceStore};
use crate::time::HostTime;

/// Identifies a session within its runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u32);

impl SessionId {
    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// The kind of experience a session provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Rendered into a page or window alongside other content.
    Inline,
    /// Takes over the display for virtual reality.
    ImmersiveVr,
    /// Takes over the display and blends with the real world.
    ImmersiveAr,
}

impl SessionMode {
    /// Whether the session needs exclusive access to the device.
    #[inline]
    #[must_use]
    pub const fn is_immersive(self) -> bool {
        matches!(self, Self::ImmersiveVr | Self::ImmersiveAr)
    }

    /// Features every session of this mode enables.
    #[must_use]
    pub const fn required_features(self) -> FeatureSet {
        let base = FeatureSet::EMPTY.with(Feature::Viewer);
        if self.is_immersive() {
            base.with(Feature::Local)
        } else {
            base
        }
    }
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Receiving ticks.
    Active,
    /// Alive but not ticking, because an immersive session holds the device.
    Suspended,
    /// Terminated. No further ticks, callbacks or events.
    Ended,
}

/// How rendered content is composited with the real world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EnvironmentBlendMode {
    /// Content fully replaces the world.
    #[default]
    Opaque,
    /// Content is alpha-blended over a camera feed.
    AlphaBlend,
    /// Content is added to light from the world.
    Additive,
}

/// Where input interfaces are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InteractionMode {
    /// On a 2D screen.
    ScreenSpace,
    /// In the 3D world.
    #[default]
    WorldSpace,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ViewSlot {
    pub(crate) eye: Eye,
    pub(crate) space: SpaceId,
}

/// One application's connection to the device.
#[derive(Debug)]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) mode: SessionMode,
    pub(crate) state: SessionState,
    pub(crate) features: FeatureSet,
    pub(crate) render_state: RenderState,
    pub(crate) pending_render_state: Option<RenderState>,
    pub(crate) callbacks: CallbackQueue,
    pub(crate) spaces: SpaceStore,
    pub(crate) viewer: ReferenceSpace,
    pub(crate) views: Vec<ViewSlot>,
    pub(crate) cameras: Option<CameraArray>,
    pub(crate) camera_update: Option<CameraUpdate>,
    pub(crate) inputs: InputSourceSet,
    pub(crate) router: InputRouter,
    pub(crate) listeners: ListenerList,
    pub(crate) tick_request: Option<TickRequest>,
    pub(crate) ticks: u64,
    pub(crate) frames: u64,
    pub(crate) last_tick: Option<HostTime>,
    pub(crate) blend_mode: EnvironmentBlendMode,
    pub(crate) interaction_mode: InteractionMode,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        mode: SessionMode,
        features: FeatureSet,
        arrangement: ViewArrangement,
    ) -> Self {
        let mut spaces = SpaceStore::new(id);
        let viewer = ReferenceSpace::new(spaces.create(SpaceRole::Viewer), ReferenceSpaceType::Viewer);
        let count = arrangement.view_count();
        let views = (0..count)
            .map(|i| ViewSlot {
                eye: match (arrangement, i) {
                    (ViewArrangement::Stereo, 0) => Eye::Left,
                    (ViewArrangement::Stereo, _) => Eye::Right,
                    _ => Eye::None,
                },
                space: spaces.create(SpaceRole::View(i)),
            })
            .collect();
        let cameras =
            matches!(arrangement, ViewArrangement::Array { .. }).then(|| CameraArray::new(count));
        Self {
            id,
            mode,
            state: SessionState::Active,
            features,
            render_state: RenderState::for_mode(mode),
            pending_render_state: None,
            callbacks: CallbackQueue::default(),
            spaces,
            viewer,
            views,
            cameras,
            camera_update: None,
            inputs: InputSourceSet::default(),
            router: InputRouter::new(id),
            listeners: ListenerList::default(),
            tick_request: None,
            ticks: 0,
            frames: 0,
            last_tick: None,
            blend_mode: EnvironmentBlendMode::default(),
            interaction_mode: InteractionMode::default(),
        }
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the session mode.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Whether the session needs exclusive device access.
    #[inline]
    #[must_use]
    pub const fn is_immersive(&self) -> bool {
        self.mode.is_immersive()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session has ended.
    #[inline]
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state == SessionState::Ended
    }

    /// Returns the active render state. Pending patches are not visible
    /// until the next tick.
    #[inline]
    #[must_use]
    pub const fn render_state(&self) -> &RenderState {
        &self.render_state
    }

    /// Returns the features enabled at creation.
    #[inline]
    #[must_use]
    pub const fn enabled_features(&self) -> FeatureSet {
        self.features
    }

    /// Returns how content is composited with the world.
    #[inline]
    #[must_use]
    pub const fn environment_blend_mode(&self) -> EnvironmentBlendMode {
        self.blend_mode
    }

    /// Returns where input interfaces are drawn.
    #[inline]
    #[must_use]
    pub const fn interaction_mode(&self) -> InteractionMode {
        self.interaction_mode
    }

    /// Returns the input sources as of the last tick.
    #[must_use]
    pub fn input_sources(&self) -> &[TrackedInput] {
        self.inputs.tracked()
    }

    /// Number of views this session renders. Fixed at creation.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "view count originates from a u32"
    )]
    #[must_use]
    pub fn view_count(&self) -> u32 {
        self.views.len() as u32
    }

    /// The session's own viewer reference space. Always the same value.
    #[inline]
    #[must_use]
    pub const fn viewer_space(&self) -> ReferenceSpace {
        self.viewer
    }

    /// Ticks delivered while active, including those without a frame.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Animation frames produced.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Light-field camera matrices, for array sessions.
    #[must_use]
    pub fn camera_array(&self) -> Option<&CameraArray> {
        self.cameras.as_ref()
    }

    /// What the most recent frame's camera derivation rebuilt.
    #[must_use]
    pub fn last_camera_update(&self) -> Option<CameraUpdate> {
        self.camera_update
    }

    /// Number of callbacks waiting for the next tick.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Queues `callback` for the next tick that produces a frame.
    pub fn request_animation_frame<F>(&mut self, callback: F) -> Result<FrameHandle, SessionError>
    where
        F: FnMut(HostTime, &mut Frame<'_>) -> CallbackResult + 'static,
    {
        if self.is_ended() {
            return Err(SessionError::SessionEnded);
        }
        Ok(self.callbacks.push(Box::new(callback)))
    }

    /// Cancels a queued callback. Also effective mid-dispatch, as long as
    /// the callback has not run yet.
    pub fn cancel_animation_frame(&mut self, handle: FrameHandle) {
        self.callbacks.cancel(handle);
    }

    /// Merges `patch` into the pending render state, applied at the next
    /// tick.
    pub fn update_render_state(&mut self, patch: RenderStatePatch) -> Result<(), SessionError> {
        if self.is_ended() {
            return Err(SessionError::SessionEnded);
        }
        if patch.target.is_some_and(|t| t.session != self.id) {
            return Err(SessionError::ForeignRenderTarget);
        }
        if self.is_immersive() && patch.inline_vertical_fov.is_some() {
            return Err(SessionError::InlineFovOnImmersive);
        }
        self.pending_render_state
            .get_or_insert(self.render_state)
            .apply(&patch);
        Ok(())
    }

    /// Binds a renderer surface to this session.
    #[must_use]
    pub const fn create_render_target(&self, surface: SurfaceId) -> RenderTarget {
        RenderTarget {
            session: self.id,
            surface,
        }
    }

    /// Registers a listener for [`SessionEvent`]s.
    pub fn add_event_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&SessionEvent, Option<&mut Frame<'_>>) -> CallbackResult + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    /// Removes a listener. A listener removed while an event is being
    /// delivered does not receive the rest of it.
    pub fn remove_event_listener(&mut self, id: ListenerId) {
        self.listeners.remove(id);
    }

    /// Creates a hit-test source casting `offset_ray` from `space`.
    pub fn request_hit_test_source(
        &mut self,
        space: &dyn AsSpace,
        offset_ray: Ray,
    ) -> Result<HitTestSource, SessionError> {
        if self.is_ended() {
            return Err(SessionError::SessionEnded);
        }
        if !self.features.contains(Feature::HitTest) {
            return Err(SessionError::FeatureUnavailable(Feature::HitTest));
        }
        if space.space_id().session() != self.id {
            return Err(SessionError::ForeignSpace);
        }
        Ok(HitTestSource::new(space.space_id(), space.origin_offset(), offset_ray))
    }

    /// Stops tracking `anchor` and forgets it in `store`.
    ///
    /// Returns whether `store` still held the anchor's handle.
    pub fn delete_anchor(
        &mut self,
        anchor: Anchor,
        store: &mut dyn AnchorStore,
    ) -> Result<bool, SessionError> {
        if anchor.space().session() != self.id {
            return Err(SessionError::ForeignSpace);
        }
        // A clone of the anchor may already have freed the slot.
        if self.spaces.is_alive(anchor.space()) {
            self.spaces.destroy(anchor.space());
        }
        Ok(store.remove(anchor.handle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_state::MAX_INLINE_FOV;
    use crate::testing::MemoryAnchors;
    use crate::transform::Transform3d;

    fn session(mode: SessionMode, arrangement: ViewArrangement) -> Session {
        Session::new(SessionId(0), mode, mode.required_features(), arrangement)
    }

    #[test]
    fn immersive_modes_require_local() {
        assert!(SessionMode::ImmersiveVr.required_features().contains(Feature::Local), "vr");
        assert!(!SessionMode::Inline.required_features().contains(Feature::Local), "inline");
        assert!(SessionMode::Inline.required_features().contains(Feature::Viewer), "viewer");
    }

    #[test]
    fn view_spaces_follow_the_arrangement() {
        let stereo = session(SessionMode::ImmersiveVr, ViewArrangement::Stereo);
        assert_eq!(stereo.view_count(), 2);
        assert_eq!(stereo.views[0].eye, Eye::Left);
        assert_eq!(stereo.views[1].eye, Eye::Right);
        assert!(stereo.camera_array().is_none(), "no array for stereo");

        let array = session(SessionMode::ImmersiveVr, ViewArrangement::Array { views: 45 });
        assert_eq!(array.view_count(), 45);
        assert_eq!(array.camera_array().map(CameraArray::view_count), Some(45));
    }

    #[test]
    fn patches_collapse_last_write_wins() {
        let mut s = session(SessionMode::Inline, ViewArrangement::Mono);
        s.update_render_state(RenderStatePatch::default().depth_near(0.5).depth_far(10.0))
            .unwrap();
        s.update_render_state(RenderStatePatch::default().depth_near(0.25)).unwrap();
        assert_eq!(s.render_state().depth_near, 0.1, "not applied before the tick");
        let pending = s.pending_render_state.unwrap();
        assert_eq!(pending.depth_near, 0.25);
        assert_eq!(pending.depth_far, 10.0);
    }

    #[test]
    fn inline_fov_is_clamped() {
        let mut s = session(SessionMode::Inline, ViewArrangement::Mono);
        s.update_render_state(RenderStatePatch::default().inline_vertical_fov(10.0))
            .unwrap();
        assert_eq!(
            s.pending_render_state.unwrap().inline_vertical_fov,
            Some(MAX_INLINE_FOV)
        );
    }

    #[test]
    fn inline_fov_on_immersive_is_a_usage_error() {
        let mut s = session(SessionMode::ImmersiveVr, ViewArrangement::Stereo);
        let err = s
            .update_render_state(RenderStatePatch::default().inline_vertical_fov(1.0))
            .unwrap_err();
        assert_eq!(err, SessionError::InlineFovOnImmersive);
        assert!(s.pending_render_state.is_none(), "rejected patch leaves nothing behind");
    }

    #[test]
    fn foreign_targets_are_rejected() {
        let mut s = session(SessionMode::Inline, ViewArrangement::Mono);
        let other = Session::new(
            SessionId(1),
            SessionMode::Inline,
            FeatureSet::EMPTY,
            ViewArrangement::Mono,
        );
        let target = other.create_render_target(SurfaceId(3));
        let err = s
            .update_render_state(RenderStatePatch::default().target(target))
            .unwrap_err();
        assert_eq!(err, SessionError::ForeignRenderTarget);
    }

    #[test]
    fn ended_sessions_refuse_work() {
        let mut s = session(SessionMode::Inline, ViewArrangement::Mono);
        s.state = SessionState::Ended;
        assert_eq!(
            s.request_animation_frame(|_, _| Ok(())).unwrap_err(),
            SessionError::SessionEnded
        );
        assert_eq!(
            s.update_render_state(RenderStatePatch::default()).unwrap_err(),
            SessionError::SessionEnded
        );
    }

    #[test]
    fn hit_testing_needs_the_feature() {
        let mut s = session(SessionMode::ImmersiveAr, ViewArrangement::Mono);
        let viewer = s.viewer_space();
        let err = s.request_hit_test_source(&viewer, Ray::default()).unwrap_err();
        assert_eq!(err, SessionError::FeatureUnavailable(Feature::HitTest));

        s.features.insert(Feature::HitTest);
        let source = s.request_hit_test_source(&viewer, Ray::default()).unwrap();
        assert_eq!(source.space(), viewer.space());
    }

    #[test]
    fn deleted_anchors_free_their_space_and_handle() {
        let mut s = session(SessionMode::ImmersiveAr, ViewArrangement::Mono);
        let mut store = MemoryAnchors::default();
        let pose = Transform3d::from_translation(0.0, 1.0, -2.0);
        let handle = store.store(pose);
        let anchor = Anchor::create(&mut s.spaces, pose, handle.clone());
        let space = anchor.space();
        let before = s.spaces.len();

        assert_eq!(s.delete_anchor(anchor.clone(), &mut store), Ok(true));
        assert!(!s.spaces.is_alive(space), "anchor space is stale");
        assert_eq!(s.spaces.len(), before - 1, "slot released");
        assert!(store.load(&handle).is_none(), "store entry removed");

        assert_eq!(
            s.delete_anchor(anchor, &mut store),
            Ok(false),
            "deleting twice is harmless"
        );
    }

    #[test]
    fn anchors_from_other_sessions_are_rejected() {
        let mut s = session(SessionMode::ImmersiveAr, ViewArrangement::Mono);
        let mut other = Session::new(
            SessionId(1),
            SessionMode::ImmersiveAr,
            FeatureSet::EMPTY,
            ViewArrangement::Mono,
        );
        let mut store = MemoryAnchors::default();
        let pose = Transform3d::IDENTITY;
        let handle = store.store(pose);
        let anchor = Anchor::create(&mut other.spaces, pose, handle.clone());

        assert_eq!(
            s.delete_anchor(anchor, &mut store),
            Err(SessionError::ForeignSpace)
        );
        assert!(store.load(&handle).is_some(), "store untouched");
    }
}
