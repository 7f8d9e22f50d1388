// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A scripted in-memory device for unit tests.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::FRAC_PI_2;

use kurbo::Rect;

use crate::device::{Device, TickRequest, TransformDeclined, ViewArrangement};
use crate::extension::AnchorStore;
use crate::feature::{Feature, FeatureSet};
use crate::input::{InputSource, InputSourceId, InputSpaceRole};
use crate::message::DeviceMessage;
use crate::multiview::{CameraArray, MultiViewConfig, TrackedPose};
use crate::reference::ReferenceSpaceType;
use crate::render_state::{RenderState, RenderStatePatch, RenderTarget, SurfaceId};
use crate::runtime::Runtime;
use crate::session::{SessionId, SessionMode};
use crate::time::HostTime;
use crate::transform::Transform3d;

const FRAME_TICKS: u64 = 16_666_667;

#[derive(Debug)]
pub(crate) struct ScriptedDevice {
    pub(crate) now: HostTime,
    pub(crate) immersive_supported: bool,
    pub(crate) features: FeatureSet,
    pub(crate) head: Transform3d,
    pub(crate) eye_offsets: Vec<f64>,
    pub(crate) sources: Vec<InputSource>,
    pub(crate) multiview: Option<MultiViewConfig>,
    pub(crate) floor_transform: Option<Transform3d>,
    pub(crate) decline: Vec<ReferenceSpaceType>,
    next_request: u64,
    pub(crate) armed: Vec<(SessionId, TickRequest)>,
    pub(crate) frame_starts: Vec<SessionId>,
    pub(crate) frame_ends: Vec<SessionId>,
    pub(crate) targets_set: Vec<RenderTarget>,
    pub(crate) ended: Vec<SessionId>,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self {
            now: HostTime(0),
            immersive_supported: true,
            features: Feature::ALL.into_iter().collect(),
            head: Transform3d::from_translation(0.0, 1.6, 0.0),
            eye_offsets: vec![-0.032, 0.032],
            sources: Vec::new(),
            multiview: None,
            floor_transform: None,
            decline: Vec::new(),
            next_request: 0,
            armed: Vec::new(),
            frame_starts: Vec::new(),
            frame_ends: Vec::new(),
            targets_set: Vec::new(),
            ended: Vec::new(),
        }
    }
}

impl Device for ScriptedDevice {
    fn now(&self) -> HostTime {
        self.now
    }

    fn is_session_supported(&self, _: SessionMode) -> bool {
        self.immersive_supported
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

    fn end_session(&mut self, session: SessionId) {
        self.ended.push(session);
    }

    fn request_tick(&mut self, session: SessionId) -> TickRequest {
        self.next_request += 1;
        let request = TickRequest(self.next_request);
        self.armed.push((session, request));
        request
    }

    fn cancel_tick(&mut self, request: TickRequest) {
        self.armed.retain(|(_, r)| *r != request);
    }

    fn on_render_target_set(&mut self, _: SessionId, target: &RenderTarget) {
        self.targets_set.push(*target);
    }

    fn on_frame_start(&mut self, session: SessionId, _: &RenderState, _: Option<&CameraArray>) {
        self.frame_starts.push(session);
    }

    fn on_frame_end(&mut self, session: SessionId) {
        self.frame_ends.push(session);
    }

    fn frame_of_reference_transform(
        &self,
        ty: ReferenceSpaceType,
    ) -> Result<Option<Transform3d>, TransformDeclined> {
        if self.decline.contains(&ty) {
            return Err(TransformDeclined);
        }
        Ok(if ty.is_floor_aligned() {
            self.floor_transform
        } else {
            None
        })
    }

    fn base_pose_matrix(&self, _: SessionMode) -> Option<Transform3d> {
        Some(self.head)
    }

    fn base_view_matrix(&self, _: SessionMode, index: u32) -> Option<Transform3d> {
        let offset = self.eye_offsets.get(index as usize).copied().unwrap_or(0.0);
        (self.head * Transform3d::from_translation(offset, 0.0, 0.0)).inverse()
    }

    fn projection_matrix(&self, _: SessionId, _: u32) -> Transform3d {
        Transform3d::perspective(FRAC_PI_2, 1.0, 0.1, 1000.0)
    }

    fn viewport(&self, _: SessionId, index: u32, _: &RenderTarget) -> Option<Rect> {
        let x = 100.0 * f64::from(index);
        Some(Rect::new(x, 0.0, x + 100.0, 100.0))
    }

    fn input_sources(&self) -> &[InputSource] {
        &self.sources
    }

    fn input_pose(&self, source: InputSourceId, _: InputSpaceRole) -> Option<Transform3d> {
        Some(Transform3d::from_translation(f64::from(source.0), 1.0, -0.5))
    }

    fn multiview_config(&self) -> Option<MultiViewConfig> {
        self.multiview
    }

    fn tracked_pose(&self) -> TrackedPose {
        TrackedPose {
            target: [0.0, 1.0, -1.0],
            yaw: 0.1,
            pitch: 0.05,
        }
    }
}

/// Advances the clock one refresh and fires every armed tick.
pub(crate) fn pump(runtime: &mut Runtime<ScriptedDevice>) {
    let device = runtime.device_mut();
    device.now = HostTime(device.now.0 + FRAME_TICKS);
    let now = device.now;
    let armed = core::mem::take(&mut device.armed);
    for (session, request) in armed {
        runtime.handle_message(DeviceMessage::Tick {
            session,
            request,
            now,
        });
    }
}

/// Patches a fresh render target into `id`'s render state.
pub(crate) fn attach_target(runtime: &mut Runtime<ScriptedDevice>, id: SessionId) -> RenderTarget {
    let target = runtime
        .create_render_target(id, SurfaceId(id.index() + 100))
        .unwrap();
    runtime
        .session_mut(id)
        .unwrap()
        .update_render_state(RenderStatePatch::default().target(target))
        .unwrap();
    target
}

#[derive(Debug, Default)]
pub(crate) struct MemoryAnchors {
    next: u32,
    poses: BTreeMap<String, Transform3d>,
}

impl AnchorStore for MemoryAnchors {
    fn load(&self, handle: &str) -> Option<Transform3d> {
        self.poses.get(handle).copied()
    }

    fn store(&mut self, pose: Transform3d) -> String {
        self.next += 1;
        let handle = format!("anchor-{}", self.next);
        self.poses.insert(handle.clone(), pose);
        handle
    }

    fn remove(&mut self, handle: &str) -> bool {
        self.poses.remove(handle).is_some()
    }
}
