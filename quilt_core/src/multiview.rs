// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Multi-view camera derivation for light-field displays.
//!
//! A light-field display shows `N` renders of the scene taken from cameras
//! spread along a horizontal baseline. All cameras converge on the same
//! target point, the zero-parallax plane of the display. This module turns
//! one [`TrackedPose`] and a [`MultiViewConfig`] into the per-view view and
//! projection matrices.
//!
//! # Geometry
//!
//! With `fov` the vertical field of view and `d` the target diameter:
//!
//! ```text
//! focal     = 0.5 * d / tan(0.5 * fov)
//! clip_bias = focal - d
//! base      = translate(target) * rot_y(yaw) * rot_x(-pitch) * translate(0, 0, focal)
//! fraction  = (i + 0.5) / N - 0.5                       (never 0 for even N)
//! angle     = view_cone * fraction
//! offset    = focal * tan(angle)
//! view_i    = inverse(base * translate(offset, 0, 0))
//! ```
//!
//! Each projection is an off-axis frustum whose horizontal centre is shifted
//! by `-n * tan(angle)`, so every camera's centre ray still passes through
//! the target. A symmetric frustum would misalign the array.
//!
//! # Caching
//!
//! [`CameraArray`] recomputes view matrices every tick. Projections and tile
//! viewports depend only on the configuration and depth range; they are
//! marked in the [`PROJECTION`](crate::dirty::PROJECTION) and
//! [`VIEWPORT`](crate::dirty::VIEWPORT) dirty channels when those inputs
//! change and rebuilt when drained.

use alloc::vec;
use alloc::vec::Vec;

use kurbo::{Rect, Size};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use understory_dirty::{Channel, CycleHandling, DirtyTracker};

use crate::dirty;
use crate::transform::Transform3d;

/// Smallest near-plane distance a view frustum may use, in meters.
pub const MIN_NEAR_PLANE: f64 = 0.01;

/// How views are tiled into one framebuffer.
///
/// View `i` occupies column `i % columns`, row `i / columns`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuiltLayout {
    /// Tiles per row.
    pub columns: u32,
    /// Tiles per column.
    pub rows: u32,
    /// Width of the whole framebuffer, in pixels.
    pub framebuffer_width: f64,
    /// Height of the whole framebuffer, in pixels.
    pub framebuffer_height: f64,
}

impl QuiltLayout {
    /// Returns the size of one tile.
    #[must_use]
    pub fn tile_size(&self) -> Size {
        Size::new(
            self.framebuffer_width / f64::from(self.columns.max(1)),
            self.framebuffer_height / f64::from(self.rows.max(1)),
        )
    }

    /// Returns the framebuffer rectangle of view `index`.
    #[must_use]
    pub fn viewport(&self, index: u32) -> Rect {
        let columns = self.columns.max(1);
        let tile = self.tile_size();
        let x = tile.width * f64::from(index % columns);
        let y = tile.height * f64::from(index / columns);
        Rect::new(x, y, x + tile.width, y + tile.height)
    }
}

impl Default for QuiltLayout {
    fn default() -> Self {
        Self {
            columns: 8,
            rows: 6,
            framebuffer_width: 3360.0,
            framebuffer_height: 3360.0,
        }
    }
}

/// Display geometry of a light-field device.
///
/// Owned by the device. The runtime reads it every tick and detects changes
/// by value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultiViewConfig {
    /// Number of views.
    pub view_count: u32,
    /// Total horizontal angle spanned by the views, in radians.
    pub view_cone: f64,
    /// Diameter of the region around the target that fits in view, in
    /// meters.
    pub target_diameter: f64,
    /// Vertical field of view of each camera, in radians.
    pub vertical_fov: f64,
    /// Width over height of each view.
    pub aspect: f64,
    /// Framebuffer tiling.
    pub quilt: QuiltLayout,
}

impl Default for MultiViewConfig {
    fn default() -> Self {
        Self {
            view_count: 48,
            view_cone: 40_f64.to_radians(),
            target_diameter: 2.0,
            vertical_fov: 14_f64.to_radians(),
            aspect: 0.75,
            quilt: QuiltLayout::default(),
        }
    }
}

/// The pose-dependent camera inputs: the point the array converges on and
/// an orbit around it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackedPose {
    /// Convergence point, in root coordinates.
    pub target: [f64; 3],
    /// Rotation about the vertical axis, in radians.
    pub yaw: f64,
    /// Elevation, in radians. Positive looks down on the target.
    pub pitch: f64,
}

/// Position of view `index` along the view cone, in `(-0.5, 0.5)`.
///
/// Symmetric about the array centre for any `count`.
#[must_use]
pub fn view_fraction(index: u32, count: u32) -> f64 {
    (f64::from(index) + 0.5) / f64::from(count) - 0.5
}

/// Configuration-derived camera constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lens {
    focal_distance: f64,
    clip_plane_bias: f64,
    tan_half_fov: f64,
    aspect: f64,
    view_cone: f64,
}

impl Lens {
    /// Derives the lens constants from a configuration.
    #[must_use]
    pub fn new(config: &MultiViewConfig) -> Self {
        let tan_half_fov = (0.5 * config.vertical_fov).tan();
        let focal_distance = 0.5 * config.target_diameter / tan_half_fov;
        Self {
            focal_distance,
            clip_plane_bias: focal_distance - config.target_diameter,
            tan_half_fov,
            aspect: config.aspect,
            view_cone: config.view_cone,
        }
    }

    /// Distance from each camera to the target.
    #[must_use]
    pub fn focal_distance(&self) -> f64 {
        self.focal_distance
    }

    /// Shift applied to the near and far planes so the zero-parallax plane
    /// sits at the target.
    #[must_use]
    pub fn clip_plane_bias(&self) -> f64 {
        self.clip_plane_bias
    }

    /// Horizontal angle of view `index` off the array centre.
    #[must_use]
    pub fn view_angle(&self, index: u32, count: u32) -> f64 {
        self.view_cone * view_fraction(index, count)
    }

    /// Sideways camera offset of view `index` along the baseline.
    #[must_use]
    pub fn baseline_offset(&self, index: u32, count: u32) -> f64 {
        self.focal_distance * self.view_angle(index, count).tan()
    }

    /// Pose of the array centre, space → root.
    #[must_use]
    pub fn base_pose(&self, pose: &TrackedPose) -> Transform3d {
        let [x, y, z] = pose.target;
        Transform3d::from_translation(x, y, z)
            * Transform3d::from_rotation_y(pose.yaw)
            * Transform3d::from_rotation_x(-pose.pitch)
            * Transform3d::from_translation(0.0, 0.0, self.focal_distance)
    }

    /// View matrix (root → camera) of view `index`.
    #[must_use]
    pub fn view_matrix(&self, base_pose: &Transform3d, index: u32, count: u32) -> Option<Transform3d> {
        let offset = self.baseline_offset(index, count);
        (*base_pose * Transform3d::from_translation(offset, 0.0, 0.0)).inverse()
    }

    /// Off-axis projection of view `index` for the given depth range.
    #[must_use]
    pub fn projection(&self, index: u32, count: u32, depth_near: f64, depth_far: f64) -> Transform3d {
        let tan_angle = self.view_angle(index, count).tan();
        let n = (self.clip_plane_bias + depth_near).max(MIN_NEAR_PLANE);
        let f = self.clip_plane_bias + depth_far;
        let half_y = n * self.tan_half_fov;
        let midpoint_x = n * -tan_angle;
        let half_x = self.aspect * half_y;
        Transform3d::frustum(
            midpoint_x - half_x,
            midpoint_x + half_x,
            -half_y,
            half_y,
            n,
            f,
        )
    }
}

/// What one [`CameraArray::update`] recomputed besides the view matrices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CameraUpdate {
    /// Views whose projection was rebuilt.
    pub projections: usize,
    /// Views whose viewport was recomputed.
    pub viewports: usize,
}

/// Cached per-view matrices for a fixed number of views.
#[derive(Debug)]
pub struct CameraArray {
    view_count: u32,
    config: Option<MultiViewConfig>,
    lens: Option<Lens>,
    depth: Option<(f64, f64)>,
    base_pose: Transform3d,
    view_matrices: Vec<Transform3d>,
    projections: Vec<Transform3d>,
    viewports: Vec<Rect>,
    dirty: DirtyTracker<u32>,
}

impl CameraArray {
    /// Creates an array of `view_count` views (at least one).
    ///
    /// Matrices are identity until the first [`update`](Self::update).
    #[must_use]
    pub fn new(view_count: u32) -> Self {
        let view_count = view_count.max(1);
        let n = view_count as usize;
        Self {
            view_count,
            config: None,
            lens: None,
            depth: None,
            base_pose: Transform3d::IDENTITY,
            view_matrices: vec![Transform3d::IDENTITY; n],
            projections: vec![Transform3d::IDENTITY; n],
            viewports: vec![Rect::ZERO; n],
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        }
    }

    /// Number of views. Fixed for the array's lifetime.
    #[must_use]
    pub fn view_count(&self) -> u32 {
        self.view_count
    }

    /// Lens constants from the last configuration seen.
    #[must_use]
    pub fn lens(&self) -> Option<&Lens> {
        self.lens.as_ref()
    }

    /// Recomputes the array for this tick.
    ///
    /// View matrices always follow `pose`. Projections are rebuilt only for
    /// views marked dirty by a configuration or depth-range change, and
    /// viewports only when the tile layout changed. `config.view_count` is
    /// ignored; the array keeps the count it was created with.
    #[must_use = "the update reports which views were rebuilt"]
    pub fn update(
        &mut self,
        config: &MultiViewConfig,
        pose: &TrackedPose,
        depth_near: f64,
        depth_far: f64,
    ) -> CameraUpdate {
        if self.config.as_ref() != Some(config) {
            if self.config.map(|c| c.quilt) != Some(config.quilt) {
                self.mark_all(dirty::VIEWPORT);
            }
            let lens = Lens::new(config);
            if self.lens != Some(lens) {
                self.mark_all(dirty::PROJECTION);
            }
            self.lens = Some(lens);
            self.config = Some(*config);
        }
        if self.depth != Some((depth_near, depth_far)) {
            self.depth = Some((depth_near, depth_far));
            self.mark_all(dirty::PROJECTION);
        }
        let Some(lens) = self.lens else {
            return CameraUpdate::default();
        };

        let n = self.view_count;
        self.base_pose = lens.base_pose(pose);
        for (i, view) in (0..n).zip(self.view_matrices.iter_mut()) {
            if let Some(m) = lens.view_matrix(&self.base_pose, i, n) {
                *view = m;
            }
        }

        let dirty_projections: Vec<u32> = self
            .dirty
            .drain(dirty::PROJECTION)
            .deterministic()
            .run()
            .collect();
        for &i in &dirty_projections {
            if let Some(slot) = self.projections.get_mut(i as usize) {
                *slot = lens.projection(i, n, depth_near, depth_far);
            }
        }

        let dirty_viewports: Vec<u32> = self
            .dirty
            .drain(dirty::VIEWPORT)
            .deterministic()
            .run()
            .collect();
        for &i in &dirty_viewports {
            if let Some(slot) = self.viewports.get_mut(i as usize) {
                *slot = config.quilt.viewport(i);
            }
        }

        CameraUpdate {
            projections: dirty_projections.len(),
            viewports: dirty_viewports.len(),
        }
    }

    /// Pose of the array centre from the last update.
    #[must_use]
    pub fn base_pose(&self) -> Transform3d {
        self.base_pose
    }

    /// View matrix of view `index`.
    #[must_use]
    pub fn view_matrix(&self, index: u32) -> Option<Transform3d> {
        self.view_matrices.get(index as usize).copied()
    }

    /// Projection matrix of view `index`.
    #[must_use]
    pub fn projection(&self, index: u32) -> Option<Transform3d> {
        self.projections.get(index as usize).copied()
    }

    /// Framebuffer tile of view `index`.
    #[must_use]
    pub fn viewport(&self, index: u32) -> Option<Rect> {
        self.viewports.get(index as usize).copied()
    }

    fn mark_all(&mut self, channel: Channel) {
        for i in 0..self.view_count {
            self.dirty.mark(i, channel);
        }
    }
}
