// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The simulated device.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::f64::consts::FRAC_PI_2;

use kurbo::{Rect, Size};
use quilt_core::device::{Device, TickRequest, TransformDeclined, ViewArrangement};
use quilt_core::error::SessionError;
use quilt_core::feature::{Feature, FeatureSet};
use quilt_core::input::{
    InputAction, InputPhase, InputSource, InputSourceId, InputSpaceRole, RawInputEvent,
};
use quilt_core::message::DeviceMessage;
use quilt_core::multiview::{CameraArray, MultiViewConfig, TrackedPose};
use quilt_core::reference::{EMULATED_EYE_HEIGHT, ReferenceSpaceType};
use quilt_core::render_state::{RenderState, RenderTarget, SurfaceId};
use quilt_core::session::{EnvironmentBlendMode, SessionId, SessionMode};
use quilt_core::time::HostTime;
use quilt_core::transform::Transform3d;

/// One display refresh at 60 Hz, in nanosecond ticks.
pub const DEFAULT_FRAME_INTERVAL: u64 = 16_666_667;

/// Default distance between the eyes, in meters.
pub const DEFAULT_IPD: f64 = 0.064;

/// Default height of the floor below the tracking origin, in meters.
pub const DEFAULT_FLOOR_HEIGHT: f64 = 1.6;

/// Vertical field of view of the simulated headset, per eye.
const HEADSET_FOV: f64 = FRAC_PI_2;

/// Tracked poses of one input source, source → root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputPoses {
    /// Pose of the pointing ray.
    pub target_ray: Transform3d,
    /// Pose of the grip, if the source has one.
    pub grip: Option<Transform3d>,
}

/// One frame the device was asked to present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRecord {
    /// Session that produced the frame.
    pub session: SessionId,
    /// Device time at frame start.
    pub started_at: HostTime,
    /// Number of views rendered.
    pub views: u32,
    /// Whether frame end was reported.
    pub ended: bool,
}

/// A deterministic in-memory [`Device`].
///
/// Time only moves when [`advance`](Self::advance) is called. Ticks requested
/// by the runtime are held until [`drain_messages`](Self::drain_messages),
/// together with queued input transitions and terminations. The tracking
/// origin is the viewer's starting position; the floor sits
/// [`floor_height`](Self::set_floor_height) below it.
#[derive(Debug)]
pub struct SimDevice {
    clock: HostTime,
    frame_interval: u64,
    immersive_supported: bool,
    features: FeatureSet,
    head: Option<Transform3d>,
    emulated_position: bool,
    ipd: f64,
    floor_height: f64,
    blend_mode: EnvironmentBlendMode,
    sources: Vec<InputSource>,
    input_poses: BTreeMap<InputSourceId, InputPoses>,
    surfaces: BTreeMap<SurfaceId, Size>,
    multiview: Option<MultiViewConfig>,
    tracked: TrackedPose,
    immersive: Vec<SessionId>,
    render_states: BTreeMap<SessionId, RenderState>,
    next_request: u64,
    armed: VecDeque<(SessionId, TickRequest)>,
    pending: VecDeque<DeviceMessage>,
    frames: Vec<FrameRecord>,
    ended: Vec<SessionId>,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDevice {
    /// Creates a headset-like device at time zero that supports every
    /// session mode and feature.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: HostTime(0),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            immersive_supported: true,
            features: Feature::ALL.into_iter().collect(),
            head: Some(Transform3d::IDENTITY),
            emulated_position: false,
            ipd: DEFAULT_IPD,
            floor_height: DEFAULT_FLOOR_HEIGHT,
            blend_mode: EnvironmentBlendMode::Opaque,
            sources: Vec::new(),
            input_poses: BTreeMap::new(),
            surfaces: BTreeMap::new(),
            multiview: None,
            tracked: TrackedPose::default(),
            immersive: Vec::new(),
            render_states: BTreeMap::new(),
            next_request: 0,
            armed: VecDeque::new(),
            pending: VecDeque::new(),
            frames: Vec::new(),
            ended: Vec::new(),
        }
    }

    /// Creates a light-field display driven by `config`.
    ///
    /// Inline sessions on this device see the head raised to
    /// [`EMULATED_EYE_HEIGHT`].
    #[must_use]
    pub fn light_field(config: MultiViewConfig) -> Self {
        Self {
            multiview: Some(config),
            ..Self::new()
        }
    }

    // -- scripting --------------------------------------------------------

    /// Current device time.
    #[must_use]
    pub fn clock(&self) -> HostTime {
        self.clock
    }

    /// Time between refreshes.
    #[must_use]
    pub fn frame_interval(&self) -> u64 {
        self.frame_interval
    }

    /// Changes the time between refreshes.
    pub fn set_frame_interval(&mut self, ticks: u64) {
        self.frame_interval = ticks;
    }

    /// Moves the clock forward by `ticks`.
    pub fn advance(&mut self, ticks: u64) {
        self.clock = HostTime(self.clock.0.saturating_add(ticks));
    }

    /// Whether immersive sessions can be created.
    pub fn set_immersive_supported(&mut self, supported: bool) {
        self.immersive_supported = supported;
    }

    /// Replaces the supported feature set.
    pub fn set_features(&mut self, features: FeatureSet) {
        self.features = features;
    }

    /// Sets the viewer pose (viewer → root). `None` simulates lost tracking.
    pub fn set_head(&mut self, head: Option<Transform3d>) {
        self.head = head;
    }

    /// Marks the viewer position as estimated rather than tracked.
    pub fn set_emulated_position(&mut self, emulated: bool) {
        self.emulated_position = emulated;
    }

    /// Sets the distance between the eyes.
    pub fn set_ipd(&mut self, ipd: f64) {
        self.ipd = ipd;
    }

    /// Sets how far the floor is below the tracking origin.
    pub fn set_floor_height(&mut self, height: f64) {
        self.floor_height = height;
    }

    /// Sets how immersive content blends with the world.
    pub fn set_blend_mode(&mut self, mode: EnvironmentBlendMode) {
        self.blend_mode = mode;
    }

    /// Starts reporting `source` with the given poses. Replaces any source
    /// with the same id.
    pub fn connect(&mut self, source: InputSource, poses: InputPoses) {
        self.disconnect(source.id);
        self.input_poses.insert(source.id, poses);
        self.sources.push(source);
    }

    /// Stops reporting a source.
    pub fn disconnect(&mut self, id: InputSourceId) {
        self.sources.retain(|s| s.id != id);
        self.input_poses.remove(&id);
    }

    /// Moves a connected source.
    pub fn move_source(&mut self, id: InputSourceId, poses: InputPoses) {
        if let Some(p) = self.input_poses.get_mut(&id) {
            *p = poses;
        }
    }

    /// Queues the start of an action on `source`, addressed to `session`.
    pub fn press(&mut self, session: SessionId, source: InputSourceId, action: InputAction) {
        self.queue_input(session, source, action, InputPhase::Start);
    }

    /// Queues the end of an action on `source`, addressed to `session`.
    pub fn release(&mut self, session: SessionId, source: InputSourceId, action: InputAction) {
        self.queue_input(session, source, action, InputPhase::End);
    }

    fn queue_input(
        &mut self,
        session: SessionId,
        source: InputSourceId,
        action: InputAction,
        phase: InputPhase,
    ) {
        self.pending
            .push_back(DeviceMessage::Input(RawInputEvent {
                session,
                source,
                action,
                phase,
            }));
    }

    /// Queues a device-initiated end of `session`.
    pub fn terminate(&mut self, session: SessionId) {
        self.pending
            .push_back(DeviceMessage::SessionTerminated(session));
    }

    /// Declares the pixel size of a renderer surface.
    pub fn add_surface(&mut self, surface: SurfaceId, size: Size) {
        self.surfaces.insert(surface, size);
    }

    /// Replaces the light-field configuration. Sessions pick the change up
    /// on their next frame.
    pub fn set_multiview(&mut self, config: Option<MultiViewConfig>) {
        self.multiview = config;
    }

    /// Sets the tracked viewer position for light-field displays.
    pub fn set_tracked_pose(&mut self, pose: TrackedPose) {
        self.tracked = pose;
    }

    // -- observation ------------------------------------------------------

    /// Number of ticks currently armed.
    #[must_use]
    pub fn armed_ticks(&self) -> usize {
        self.armed.len()
    }

    /// Frames presented so far, in order.
    #[must_use]
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    /// Sessions the runtime has ended, in order.
    #[must_use]
    pub fn ended_sessions(&self) -> &[SessionId] {
        &self.ended
    }

    /// Takes every message due at the current time: queued input and
    /// terminations first, then one tick per armed request.
    ///
    /// Ticks armed while the returned messages are handled belong to the
    /// next refresh.
    pub fn drain_messages(&mut self) -> Vec<DeviceMessage> {
        let now = self.clock;
        let mut out: Vec<_> = self.pending.drain(..).collect();
        out.extend(
            self.armed
                .drain(..)
                .map(|(session, request)| DeviceMessage::Tick {
                    session,
                    request,
                    now,
                }),
        );
        out
    }

    fn has_stereo_views(&self, mode: SessionMode) -> bool {
        mode.is_immersive() && self.multiview.is_none()
    }

    fn surface_size(&self, target: &RenderTarget) -> Option<Size> {
        self.surfaces.get(&target.surface()).copied()
    }
}

impl Device for SimDevice {
    fn now(&self) -> HostTime {
        self.clock
    }

    fn is_session_supported(&self, mode: SessionMode) -> bool {
        !mode.is_immersive() || self.immersive_supported
    }

    fn is_feature_supported(&self, feature: Feature) -> bool {
        self.features.contains(feature)
    }

    fn view_arrangement(&self, mode: SessionMode) -> ViewArrangement {
        match (mode.is_immersive(), self.multiview) {
            (false, _) => ViewArrangement::Mono,
            (true, Some(config)) => ViewArrangement::Array {
                views: config.view_count,
            },
            (true, None) => ViewArrangement::Stereo,
        }
    }

    fn request_session(
        &mut self,
        session: SessionId,
        mode: SessionMode,
        _: FeatureSet,
    ) -> Result<(), SessionError> {
        if mode.is_immersive() {
            self.immersive.push(session);
        }
        Ok(())
    }

    fn end_session(&mut self, session: SessionId) {
        self.immersive.retain(|s| *s != session);
        self.render_states.remove(&session);
        self.ended.push(session);
    }

    fn request_tick(&mut self, session: SessionId) -> TickRequest {
        self.next_request += 1;
        let request = TickRequest(self.next_request);
        self.armed.push_back((session, request));
        request
    }

    fn cancel_tick(&mut self, request: TickRequest) {
        self.armed.retain(|(_, r)| *r != request);
    }

    fn on_frame_start(
        &mut self,
        session: SessionId,
        render_state: &RenderState,
        cameras: Option<&CameraArray>,
    ) {
        self.render_states.insert(session, *render_state);
        let views = match cameras {
            Some(cameras) => cameras.view_count(),
            None if self.immersive.contains(&session) => 2,
            None => 1,
        };
        self.frames.push(FrameRecord {
            session,
            started_at: self.clock,
            views,
            ended: false,
        });
    }

    fn on_frame_end(&mut self, session: SessionId) {
        if let Some(record) = self
            .frames
            .iter_mut()
            .rev()
            .find(|r| r.session == session)
        {
            record.ended = true;
        }
    }

    fn frame_of_reference_transform(
        &self,
        ty: ReferenceSpaceType,
    ) -> Result<Option<Transform3d>, TransformDeclined> {
        match ty {
            ReferenceSpaceType::Viewer | ReferenceSpaceType::Local => Ok(None),
            ReferenceSpaceType::LocalFloor | ReferenceSpaceType::BoundedFloor => Ok(Some(
                Transform3d::from_translation(0.0, self.floor_height, 0.0),
            )),
            ReferenceSpaceType::Unbounded => Err(TransformDeclined),
        }
    }

    fn base_pose_matrix(&self, mode: SessionMode) -> Option<Transform3d> {
        let head = self.head?;
        if !mode.is_immersive() && self.multiview.is_some() {
            // Inline previews on a light-field display have no tracked eye.
            return Some(Transform3d::from_translation(0.0, EMULATED_EYE_HEIGHT, 0.0) * head);
        }
        Some(head)
    }

    fn base_view_matrix(&self, mode: SessionMode, index: u32) -> Option<Transform3d> {
        let head = self.base_pose_matrix(mode)?;
        let offset = if self.has_stereo_views(mode) {
            if index == 0 { -self.ipd / 2.0 } else { self.ipd / 2.0 }
        } else {
            0.0
        };
        (head * Transform3d::from_translation(offset, 0.0, 0.0)).inverse()
    }

    fn projection_matrix(&self, session: SessionId, _: u32) -> Transform3d {
        let state = self.render_states.get(&session);
        let (near, far) = state.map_or((0.1, 1000.0), |s| (s.depth_near, s.depth_far));
        let size = state
            .and_then(|s| s.target.as_ref())
            .and_then(|t| self.surface_size(t));
        match state.and_then(|s| s.inline_vertical_fov) {
            Some(fov) => {
                let aspect = size.map_or(1.0, |s| s.width / s.height.max(1.0));
                Transform3d::perspective(fov, aspect, near, far)
            }
            None => {
                let aspect = size.map_or(1.0, |s| s.width / 2.0 / s.height.max(1.0));
                Transform3d::perspective(HEADSET_FOV, aspect, near, far)
            }
        }
    }

    fn viewport(&self, session: SessionId, index: u32, target: &RenderTarget) -> Option<Rect> {
        let size = self.surface_size(target)?;
        if self.immersive.contains(&session) && self.multiview.is_none() {
            let half = size.width / 2.0;
            let x0 = if index == 0 { 0.0 } else { half };
            Some(Rect::new(x0, 0.0, x0 + half, size.height))
        } else {
            Some(size.to_rect())
        }
    }

    fn input_sources(&self) -> &[InputSource] {
        &self.sources
    }

    fn input_pose(&self, source: InputSourceId, role: InputSpaceRole) -> Option<Transform3d> {
        let poses = self.input_poses.get(&source)?;
        match role {
            InputSpaceRole::TargetRay => Some(poses.target_ray),
            InputSpaceRole::Grip => poses.grip,
        }
    }

    fn multiview_config(&self) -> Option<MultiViewConfig> {
        self.multiview
    }

    fn tracked_pose(&self) -> TrackedPose {
        self.tracked
    }

    fn environment_blend_mode(&self, mode: SessionMode) -> EnvironmentBlendMode {
        if mode.is_immersive() {
            self.blend_mode
        } else {
            EnvironmentBlendMode::Opaque
        }
    }

    fn is_position_emulated(&self) -> bool {
        self.emulated_position
    }
}
