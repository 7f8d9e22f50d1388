// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device contract for tracking hardware and display integrations.
//!
//! Quilt never talks to hardware directly. A *device* crate implements
//! [`Device`] and feeds the runtime [`DeviceMessage`]s. A device provides:
//!
//! - **Tick source**: [`request_tick`](Device::request_tick) arms one
//!   display-refresh callback for a session and returns a [`TickRequest`]
//!   token. When the refresh happens the device sends
//!   [`DeviceMessage::Tick`] carrying that token. Only the most recent token
//!   of a session is honored, so a cancelled or superseded request that
//!   still fires is ignored.
//!
//! - **Tracking**: the base pose and base view matrix of the viewer, the
//!   input sources currently present and their poses, and optionally a
//!   [`TrackedPose`] for light-field arrays.
//!
//! - **Display geometry**: per-view projection matrices and viewports, or a
//!   [`MultiViewConfig`] from which the runtime derives them.
//!
//! - **Capabilities**: which session modes and features exist, and the
//!   frame-of-reference transform for each reference-space type. A device
//!   may decline to supply a transform.
//!
//! - **Frame notifications**: [`on_frame_start`](Device::on_frame_start)
//!   before any callback of a tick runs and
//!   [`on_frame_end`](Device::on_frame_end) after the last one. Presentation
//!   happens there.
//!
//! # Crate boundaries
//!
//! `quilt_core` owns the data model, scheduling, camera derivation and this
//! contract module. Device crates depend on `quilt_core` and provide the
//! platform glue. Application code depends on both and drives the runtime
//! from the device's event loop.
//!
//! [`DeviceMessage`]: crate::message::DeviceMessage
//! [`DeviceMessage::Tick`]: crate::message::DeviceMessage::Tick

use kurbo::Rect;

use crate::error::SessionError;
use crate::feature::{Feature, FeatureSet};
use crate::input::{InputSource, InputSourceId, InputSpaceRole};
use crate::multiview::{CameraArray, MultiViewConfig, TrackedPose};
use crate::reference::ReferenceSpaceType;
use crate::render_state::{RenderState, RenderTarget};
use crate::session::{EnvironmentBlendMode, InteractionMode, SessionId, SessionMode};
use crate::time::HostTime;
use crate::transform::Transform3d;

/// Token identifying one armed tick request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickRequest(pub u64);

/// How many views a session of some mode renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewArrangement {
    /// One view.
    Mono,
    /// A left and a right eye.
    Stereo,
    /// A light-field array of derived cameras.
    Array {
        /// Number of views. Treated as at least one.
        views: u32,
    },
}

impl ViewArrangement {
    /// Number of views in the arrangement.
    #[must_use]
    pub const fn view_count(self) -> u32 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Array { views } => {
                if views == 0 {
                    1
                } else {
                    views
                }
            }
        }
    }
}

/// Returned by a device that will not supply a frame-of-reference transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformDeclined;

/// A tracking and display device driving one or more sessions.
///
/// # Frame loop pseudocode
///
/// A device event loop wires the pieces together like this:
///
/// ```rust,ignore
/// loop {
///     // The display refreshed for every session with an armed request.
///     for (session, request) in device.fired_ticks() {
///         runtime.handle_message(DeviceMessage::Tick { session, request, now: device.now() });
///     }
///
///     // Raw select/squeeze transitions since the last refresh.
///     for raw in device.take_input_events() {
///         runtime.handle_message(DeviceMessage::Input(raw));
///     }
/// }
/// ```
pub trait Device {
    /// Current device time.
    fn now(&self) -> HostTime;

    /// Whether sessions of `mode` can be created. Inline sessions never ask.
    fn is_session_supported(&self, mode: SessionMode) -> bool;

    /// Whether `feature` can be enabled.
    fn is_feature_supported(&self, feature: Feature) -> bool;

    /// How many views a session of `mode` renders.
    fn view_arrangement(&self, mode: SessionMode) -> ViewArrangement;

    /// Called once a session's features are resolved, before it is handed
    /// to the caller. Returning `Err` aborts the request.
    fn request_session(
        &mut self,
        session: SessionId,
        mode: SessionMode,
        features: FeatureSet,
    ) -> Result<(), SessionError> {
        _ = (session, mode, features);
        Ok(())
    }

    /// Called when a session ends.
    fn end_session(&mut self, session: SessionId);

    /// Arms one tick for `session`.
    fn request_tick(&mut self, session: SessionId) -> TickRequest;

    /// Disarms a pending tick request.
    fn cancel_tick(&mut self, request: TickRequest);

    /// Called when an applied render state carries a target.
    fn on_render_target_set(&mut self, session: SessionId, target: &RenderTarget) {
        _ = (session, target);
    }

    /// Called before the first callback of a tick.
    ///
    /// `cameras` holds the freshly derived matrices for light-field sessions.
    fn on_frame_start(
        &mut self,
        session: SessionId,
        render_state: &RenderState,
        cameras: Option<&CameraArray>,
    );

    /// Called after the last callback of a tick.
    fn on_frame_end(&mut self, session: SessionId);

    /// The baseline transform for a reference-space type, root → space.
    ///
    /// `Ok(None)` means the device has no transform and the runtime should
    /// fall back to its defaults.
    fn frame_of_reference_transform(
        &self,
        ty: ReferenceSpaceType,
    ) -> Result<Option<Transform3d>, TransformDeclined>;

    /// The viewer's pose for a session of `mode`, viewer → root.
    fn base_pose_matrix(&self, mode: SessionMode) -> Option<Transform3d>;

    /// The view matrix (root → view) of view `index` for a session of `mode`.
    fn base_view_matrix(&self, mode: SessionMode, index: u32) -> Option<Transform3d>;

    /// The projection matrix of view `index` for `session`.
    fn projection_matrix(&self, session: SessionId, index: u32) -> Transform3d;

    /// The viewport of view `index` within `target`.
    fn viewport(&self, session: SessionId, index: u32, target: &RenderTarget) -> Option<Rect>;

    /// Input sources currently present.
    fn input_sources(&self) -> &[InputSource];

    /// The pose of an input source's target-ray or grip space, space → root.
    fn input_pose(&self, source: InputSourceId, role: InputSpaceRole) -> Option<Transform3d>;

    /// Light-field display geometry. `None` for conventional displays.
    fn multiview_config(&self) -> Option<MultiViewConfig> {
        None
    }

    /// Convergence target and orbit of a light-field array.
    fn tracked_pose(&self) -> TrackedPose {
        TrackedPose::default()
    }

    /// How rendered content is composited with the real world.
    fn environment_blend_mode(&self, mode: SessionMode) -> EnvironmentBlendMode {
        _ = mode;
        EnvironmentBlendMode::Opaque
    }

    /// Where input interfaces are expected to be drawn.
    fn interaction_mode(&self, mode: SessionMode) -> InteractionMode {
        _ = mode;
        InteractionMode::WorldSpace
    }

    /// Whether reported positions are estimated rather than tracked.
    fn is_position_emulated(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_counts() {
        assert_eq!(ViewArrangement::Mono.view_count(), 1);
        assert_eq!(ViewArrangement::Stereo.view_count(), 2);
        assert_eq!(ViewArrangement::Array { views: 48 }.view_count(), 48);
        assert_eq!(ViewArrangement::Array { views: 0 }.view_count(), 1);
    }
}
