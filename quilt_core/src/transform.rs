// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal column-major 4×4 transform.
//!
//! This type covers the subset of 3-D transforms that `quilt_core` needs:
//! rigid composition, general inversion, and the off-axis and symmetric
//! projections used by the camera array. It avoids pulling in a full
//! linear-algebra crate.

use core::ops::Mul;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, matching the memory layout
/// used by GPU APIs. Translation lives in column 3.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Returns column `i` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f64; 4] {
        self.cols[i]
    }

    /// Returns the translation component (column 3, without `w`).
    #[inline]
    #[must_use]
    pub const fn translation(self) -> [f64; 3] {
        [self.cols[3][0], self.cols[3][1], self.cols[3][2]]
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a rotation around the X axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_x(radians: f64) -> Self {
        let (s, c) = sin_cos(radians);
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, c, s, 0.0],
                [0.0, -s, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Y axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_y(radians: f64) -> Self {
        let (s, c) = sin_cos(radians);
        Self {
            cols: [
                [c, 0.0, -s, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [s, 0.0, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation of `radians` around an arbitrary axis.
    ///
    /// Returns `None` if `axis` has (near) zero length.
    #[must_use]
    pub fn from_axis_angle(axis: [f64; 3], radians: f64) -> Option<Self> {
        let len = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        if len < 1e-9 {
            return None;
        }
        let [x, y, z] = [axis[0] / len, axis[1] / len, axis[2] / len];
        let (s, c) = sin_cos(radians);
        let t = 1.0 - c;
        Some(Self {
            cols: [
                [x * x * t + c, y * x * t + z * s, z * x * t - y * s, 0.0],
                [x * y * t - z * s, y * y * t + c, z * y * t + x * s, 0.0],
                [x * z * t + y * s, y * z * t - x * s, z * z * t + c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        })
    }

    /// Creates an OpenGL-style projection for an arbitrary (possibly
    /// asymmetric) view frustum.
    ///
    /// `left`, `right`, `bottom` and `top` are the frustum edges on the near
    /// plane.
    #[must_use]
    pub fn frustum(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Self {
        Self {
            cols: [
                [2.0 * near / (right - left), 0.0, 0.0, 0.0],
                [0.0, 2.0 * near / (top - bottom), 0.0, 0.0],
                [
                    (right + left) / (right - left),
                    (top + bottom) / (top - bottom),
                    -(far + near) / (far - near),
                    -1.0,
                ],
                [0.0, 0.0, -2.0 * far * near / (far - near), 0.0],
            ],
        }
    }

    /// Creates a symmetric perspective projection.
    ///
    /// `fov_y` is the full vertical field of view in radians. An infinite
    /// `far` yields an infinite far plane.
    #[must_use]
    pub fn perspective(fov_y: f64, aspect: f64, near: f64, far: f64) -> Self {
        let f = 1.0 / (fov_y / 2.0).tan();
        let (zz, zw) = if far.is_finite() {
            let nf = 1.0 / (near - far);
            ((far + near) * nf, 2.0 * far * near * nf)
        } else {
            (-1.0, -2.0 * near)
        };
        Self {
            cols: [
                [f / aspect, 0.0, 0.0, 0.0],
                [0.0, f, 0.0, 0.0],
                [0.0, 0.0, zz, -1.0],
                [0.0, 0.0, zw, 0.0],
            ],
        }
    }

    /// Returns the inverse of this transform, or `None` if it is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let [a00, a01, a02, a03] = self.cols[0];
        let [a10, a11, a12, a13] = self.cols[1];
        let [a20, a21, a22, a23] = self.cols[2];
        let [a30, a31, a32, a33] = self.cols[3];

        let b00 = a00 * a11 - a01 * a10;
        let b01 = a00 * a12 - a02 * a10;
        let b02 = a00 * a13 - a03 * a10;
        let b03 = a01 * a12 - a02 * a11;
        let b04 = a01 * a13 - a03 * a11;
        let b05 = a02 * a13 - a03 * a12;
        let b06 = a20 * a31 - a21 * a30;
        let b07 = a20 * a32 - a22 * a30;
        let b08 = a20 * a33 - a23 * a30;
        let b09 = a21 * a32 - a22 * a31;
        let b10 = a21 * a33 - a23 * a31;
        let b11 = a22 * a33 - a23 * a32;

        let det = b00 * b11 - b01 * b10 + b02 * b09 + b03 * b08 - b04 * b07 + b05 * b06;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;

        Some(Self {
            cols: [
                [
                    (a11 * b11 - a12 * b10 + a13 * b09) * inv,
                    (a02 * b10 - a01 * b11 - a03 * b09) * inv,
                    (a31 * b05 - a32 * b04 + a33 * b03) * inv,
                    (a22 * b04 - a21 * b05 - a23 * b03) * inv,
                ],
                [
                    (a12 * b08 - a10 * b11 - a13 * b07) * inv,
                    (a00 * b11 - a02 * b08 + a03 * b07) * inv,
                    (a32 * b02 - a30 * b05 - a33 * b01) * inv,
                    (a20 * b05 - a22 * b02 + a23 * b01) * inv,
                ],
                [
                    (a10 * b10 - a11 * b08 + a13 * b06) * inv,
                    (a01 * b08 - a00 * b10 - a03 * b06) * inv,
                    (a30 * b04 - a31 * b02 + a33 * b00) * inv,
                    (a21 * b02 - a20 * b04 - a23 * b00) * inv,
                ],
                [
                    (a11 * b07 - a10 * b09 - a12 * b06) * inv,
                    (a00 * b09 - a01 * b07 + a02 * b06) * inv,
                    (a31 * b01 - a30 * b03 - a32 * b00) * inv,
                    (a20 * b03 - a21 * b01 + a22 * b00) * inv,
                ],
            ],
        })
    }

    /// Transforms a point (`w = 1`), without perspective division.
    #[inline]
    #[must_use]
    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 3] {
        let c = &self.cols;
        [
            c[0][0] * p[0] + c[1][0] * p[1] + c[2][0] * p[2] + c[3][0],
            c[0][1] * p[0] + c[1][1] * p[1] + c[2][1] * p[2] + c[3][1],
            c[0][2] * p[0] + c[1][2] * p[1] + c[2][2] * p[2] + c[3][2],
        ]
    }

    /// Transforms a direction (`w = 0`), ignoring translation.
    #[inline]
    #[must_use]
    pub fn transform_vector(&self, v: [f64; 3]) -> [f64; 3] {
        let c = &self.cols;
        [
            c[0][0] * v[0] + c[1][0] * v[1] + c[2][0] * v[2],
            c[0][1] * v[0] + c[1][1] * v[1] + c[2][1] * v[2],
            c[0][2] * v[0] + c[1][2] * v[1] + c[2][2] * v[2],
        ]
    }

    /// Returns whether every element is within `eps` of the matching element
    /// of `other`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.cols
            .iter()
            .flatten()
            .zip(other.cols.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}

#[inline]
fn sin_cos(radians: f64) -> (f64, f64) {
    #[cfg(feature = "std")]
    {
        radians.sin_cos()
    }
    #[cfg(not(feature = "std"))]
    {
        (radians.sin(), radians.cos())
    }
}
