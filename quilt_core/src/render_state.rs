// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render state and deferred render-state patches.
//!
//! A session renders with its *active* [`RenderState`]. Callers never edit it
//! directly: [`Session::update_render_state`](crate::session::Session::update_render_state)
//! merges a [`RenderStatePatch`] into a *pending* state, which replaces the
//! active one at the start of the next tick. Several patches issued within
//! one tick therefore collapse field by field, last write wins.

use core::f64::consts::FRAC_PI_2;
use core::fmt;

use crate::session::{SessionId, SessionMode};

/// Smallest inline vertical field of view, in radians.
pub const MIN_INLINE_FOV: f64 = 0.01;

/// Largest inline vertical field of view, in radians.
pub const MAX_INLINE_FOV: f64 = 3.13;

/// An opaque reference to a renderer-owned surface.
///
/// Surfaces are allocated by the renderer collaborator. The runtime only
/// passes them through to the device.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceId({})", self.0)
    }
}

/// A surface bound to one session, attachable to that session's render
/// state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTarget {
    pub(crate) session: SessionId,
    pub(crate) surface: SurfaceId,
}

impl RenderTarget {
    /// Returns the session this target was created for.
    #[inline]
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Returns the underlying surface.
    #[inline]
    #[must_use]
    pub const fn surface(&self) -> SurfaceId {
        self.surface
    }
}

/// Parameters the device renders a session's frames with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderState {
    /// Distance from the viewer to the near clip plane, in meters.
    pub depth_near: f64,
    /// Distance from the viewer to the far clip plane, in meters.
    pub depth_far: f64,
    /// Vertical field of view for inline sessions, in radians. Always `None`
    /// for immersive sessions.
    pub inline_vertical_fov: Option<f64>,
    /// Where frames are drawn. No frame is produced while this is `None`.
    pub target: Option<RenderTarget>,
}

impl RenderState {
    /// Returns the initial render state for a session of `mode`.
    #[must_use]
    pub const fn for_mode(mode: SessionMode) -> Self {
        Self {
            depth_near: 0.1,
            depth_far: 1000.0,
            inline_vertical_fov: if mode.is_immersive() {
                None
            } else {
                Some(FRAC_PI_2)
            },
            target: None,
        }
    }

    /// Returns whether frames can be produced with this state.
    #[inline]
    #[must_use]
    pub const fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Overwrites every field the patch sets.
    pub(crate) fn apply(&mut self, patch: &RenderStatePatch) {
        if let Some(near) = patch.depth_near {
            self.depth_near = near;
        }
        if let Some(far) = patch.depth_far {
            self.depth_far = far;
        }
        if let Some(fov) = patch.inline_vertical_fov {
            self.inline_vertical_fov = Some(fov.clamp(MIN_INLINE_FOV, MAX_INLINE_FOV));
        }
        if let Some(target) = patch.target {
            self.target = Some(target);
        }
    }
}

/// A partial update to a [`RenderState`]. Unset fields leave the current
/// value alone.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderStatePatch {
    /// New near plane distance.
    pub depth_near: Option<f64>,
    /// New far plane distance.
    pub depth_far: Option<f64>,
    /// New inline vertical field of view. Clamped to
    /// [`MIN_INLINE_FOV`]..=[`MAX_INLINE_FOV`].
    pub inline_vertical_fov: Option<f64>,
    /// New render target.
    pub target: Option<RenderTarget>,
}

impl RenderStatePatch {
    /// Sets the near plane distance.
    #[must_use]
    pub const fn depth_near(mut self, near: f64) -> Self {
        self.depth_near = Some(near);
        self
    }

    /// Sets the far plane distance.
    #[must_use]
    pub const fn depth_far(mut self, far: f64) -> Self {
        self.depth_far = Some(far);
        self
    }

    /// Sets the inline vertical field of view.
    #[must_use]
    pub const fn inline_vertical_fov(mut self, fov: f64) -> Self {
        self.inline_vertical_fov = Some(fov);
        self
    }

    /// Sets the render target.
    #[must_use]
    pub const fn target(mut self, target: RenderTarget) -> Self {
        self.target = Some(target);
        self
    }
}
