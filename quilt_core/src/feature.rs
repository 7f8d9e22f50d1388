// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Session features and their resolution against a device.

use core::fmt;

/// A capability a session can request.
///
/// Reference-space features gate the matching
/// [`ReferenceSpaceType`](crate::reference::ReferenceSpaceType); the others
/// gate the extension collaborators in [`extension`](crate::extension).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Head-locked viewer space.
    Viewer,
    /// Seated space with its origin near the viewer's starting position.
    Local,
    /// Standing space with its origin on the floor.
    LocalFloor,
    /// Floor space with a bounded walkable area.
    BoundedFloor,
    /// Space for large-scale tracking without a fixed origin.
    Unbounded,
    /// Hit testing against real-world geometry.
    HitTest,
    /// Persistent spatial anchors.
    Anchors,
    /// Plane detection.
    PlaneDetection,
    /// Light estimation.
    LightEstimation,
}

impl Feature {
    /// All features, in bit order.
    pub const ALL: [Self; 9] = [
        Self::Viewer,
        Self::Local,
        Self::LocalFloor,
        Self::BoundedFloor,
        Self::Unbounded,
        Self::HitTest,
        Self::Anchors,
        Self::PlaneDetection,
        Self::LightEstimation,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// A small set of [`Feature`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeatureSet(u16);

impl FeatureSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Returns a copy of this set with `feature` added.
    #[inline]
    #[must_use]
    pub const fn with(self, feature: Feature) -> Self {
        Self(self.0 | feature.bit())
    }

    /// Adds `feature` to the set.
    #[inline]
    pub fn insert(&mut self, feature: Feature) {
        self.0 |= feature.bit();
    }

    /// Returns whether `feature` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    /// Returns whether the set is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterates over the features in the set, in bit order.
    pub fn iter(self) -> impl Iterator<Item = Feature> {
        Feature::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for feature in iter {
            set.insert(feature);
        }
        set
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Options for [`Runtime::request_session`](crate::runtime::Runtime::request_session).
///
/// The mode's default features are always required in addition to
/// `required_features`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionInit {
    /// Features the session cannot run without.
    pub required_features: FeatureSet,
    /// Features enabled only when the device supports them.
    pub optional_features: FeatureSet,
}
