// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants for the camera array.
//!
//! [`CameraArray`](crate::multiview::CameraArray) keys its per-view caches by
//! view index in an [`understory_dirty`] tracker. Both channels are
//! local-only: views do not depend on one another, so marking one view never
//! dirties another.
//!
//! View matrices are not tracked here. They depend on the tracked pose and
//! are recomputed on every tick.

use understory_dirty::Channel;

/// Frustum inputs changed (lens configuration or depth range). The view's
/// projection matrix must be rebuilt.
pub const PROJECTION: Channel = Channel::new(0);

/// Tile layout changed. The view's viewport rectangle must be recomputed.
pub const VIEWPORT: Channel = Channel::new(1);
