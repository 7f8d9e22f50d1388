// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Position plus orientation, the form in which poses are reported.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::transform::Transform3d;

/// A rigid transform: a unit-quaternion orientation followed by a
/// translation, with no scale or shear.
///
/// The equivalent [`Transform3d`] is computed once at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    position: [f64; 3],
    orientation: [f64; 4],
    matrix: Transform3d,
}

impl RigidTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        orientation: [0.0, 0.0, 0.0, 1.0],
        matrix: Transform3d::IDENTITY,
    };

    /// Creates a rigid transform from a position and an `[x, y, z, w]`
    /// quaternion.
    ///
    /// The quaternion is normalized. A zero-length quaternion is treated as
    /// no rotation.
    #[must_use]
    pub fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        let [x, y, z, w] = orientation;
        let len = (x * x + y * y + z * z + w * w).sqrt();
        let orientation = if len > 1e-12 && len.is_finite() {
            [x / len, y / len, z / len, w / len]
        } else {
            [0.0, 0.0, 0.0, 1.0]
        };
        Self {
            position,
            orientation,
            matrix: compose(position, orientation),
        }
    }

    /// Decomposes a matrix into position and orientation.
    ///
    /// Any scale in the upper 3×3 block is divided out before the rotation is
    /// extracted.
    #[must_use]
    pub fn from_matrix(m: &Transform3d) -> Self {
        let position = m.translation();
        let scale = [
            column_len(m.cols[0]),
            column_len(m.cols[1]),
            column_len(m.cols[2]),
        ];
        // r(row, col), scale removed per column.
        let r = |row: usize, col: usize| {
            if scale[col] > 0.0 {
                m.cols[col][row] / scale[col]
            } else {
                m.cols[col][row]
            }
        };
        let trace = r(0, 0) + r(1, 1) + r(2, 2);
        let orientation = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            [
                (r(2, 1) - r(1, 2)) / s,
                (r(0, 2) - r(2, 0)) / s,
                (r(1, 0) - r(0, 1)) / s,
                0.25 * s,
            ]
        } else if r(0, 0) > r(1, 1) && r(0, 0) > r(2, 2) {
            let s = (1.0 + r(0, 0) - r(1, 1) - r(2, 2)).sqrt() * 2.0;
            [
                0.25 * s,
                (r(0, 1) + r(1, 0)) / s,
                (r(0, 2) + r(2, 0)) / s,
                (r(2, 1) - r(1, 2)) / s,
            ]
        } else if r(1, 1) > r(2, 2) {
            let s = (1.0 + r(1, 1) - r(0, 0) - r(2, 2)).sqrt() * 2.0;
            [
                (r(0, 1) + r(1, 0)) / s,
                0.25 * s,
                (r(1, 2) + r(2, 1)) / s,
                (r(0, 2) - r(2, 0)) / s,
            ]
        } else {
            let s = (1.0 + r(2, 2) - r(0, 0) - r(1, 1)).sqrt() * 2.0;
            [
                (r(0, 2) + r(2, 0)) / s,
                (r(1, 2) + r(2, 1)) / s,
                0.25 * s,
                (r(1, 0) - r(0, 1)) / s,
            ]
        };
        Self::new(position, orientation)
    }

    /// Returns the translation.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> [f64; 3] {
        self.position
    }

    /// Returns the orientation as an `[x, y, z, w]` unit quaternion.
    #[inline]
    #[must_use]
    pub const fn orientation(&self) -> [f64; 4] {
        self.orientation
    }

    /// Returns the equivalent 4×4 matrix.
    #[inline]
    #[must_use]
    pub const fn matrix(&self) -> Transform3d {
        self.matrix
    }

    /// Returns the inverse transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let [x, y, z, w] = self.orientation;
        let conj = [-x, -y, -z, w];
        let m = compose([0.0; 3], conj);
        let [px, py, pz] = m.transform_point(self.position);
        Self::new([-px, -py, -pz], conj)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn column_len(c: [f64; 4]) -> f64 {
    (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt()
}

fn compose(p: [f64; 3], q: [f64; 4]) -> Transform3d {
    let [x, y, z, w] = q;
    let (x2, y2, z2) = (x + x, y + y, z + z);
    let (xx, xy, xz) = (x * x2, x * y2, x * z2);
    let (yy, yz, zz) = (y * y2, y * z2, z * z2);
    let (wx, wy, wz) = (w * x2, w * y2, w * z2);
    Transform3d::from_cols(
        [1.0 - (yy + zz), xy + wz, xz - wy, 0.0],
        [xy - wz, 1.0 - (xx + zz), yz + wx, 0.0],
        [xz + wy, yz - wx, 1.0 - (xx + yy), 0.0],
        [p[0], p[1], p[2], 1.0],
    )
}
