// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy for runtime and session operations.

use alloc::boxed::Box;
use core::fmt;

use crate::feature::Feature;
use crate::reference::ReferenceSpaceType;
use crate::session::{SessionId, SessionMode};

/// Coarse classification of a [`SessionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request names a mode or space type that cannot be configured, or
    /// the device omitted a transform the request depends on.
    Configuration,
    /// The target session or frame is in the wrong lifecycle state.
    State,
    /// The caller supplied contradictory or foreign arguments.
    Usage,
    /// The device cannot provide what was asked for.
    NotSupported,
}

/// Errors returned by [`Runtime`](crate::runtime::Runtime), session and
/// [`Frame`](crate::frame::Frame) operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// The device does not offer sessions of this mode.
    UnsupportedMode(SessionMode),
    /// The reference-space type was not enabled for the session.
    UnsupportedReferenceSpace(ReferenceSpaceType),
    /// A floor-aligned bounded space needs a device transform and none was
    /// supplied.
    MissingFloorTransform,
    /// A required session feature is not available on the device.
    FeatureUnavailable(Feature),
    /// The device declined to supply a frame-of-reference transform.
    TransformDeclined(ReferenceSpaceType),
    /// Bounded floor spaces are not implemented even with a device transform.
    BoundedFloorUnavailable,
    /// No anchor is stored under the requested handle.
    AnchorNotFound,
    /// No session with this id exists.
    UnknownSession(SessionId),
    /// The session has ended.
    SessionEnded,
    /// The frame is used outside the callback or event that produced it.
    FrameInactive,
    /// The operation needs a scheduled animation frame, not an input frame.
    NotAnimationFrame,
    /// An inline field of view was set on an immersive session.
    InlineFovOnImmersive,
    /// The render target belongs to a different session.
    ForeignRenderTarget,
    /// The space belongs to a different session.
    ForeignSpace,
}

impl SessionError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedMode(_)
            | Self::UnsupportedReferenceSpace(_)
            | Self::MissingFloorTransform => ErrorKind::Configuration,
            Self::UnknownSession(_)
            | Self::SessionEnded
            | Self::FrameInactive
            | Self::NotAnimationFrame => ErrorKind::State,
            Self::InlineFovOnImmersive
            | Self::ForeignRenderTarget
            | Self::ForeignSpace
            | Self::AnchorNotFound => ErrorKind::Usage,
            Self::FeatureUnavailable(_)
            | Self::TransformDeclined(_)
            | Self::BoundedFloorUnavailable => ErrorKind::NotSupported,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMode(mode) => write!(f, "session mode {mode:?} is not supported"),
            Self::UnsupportedReferenceSpace(ty) => {
                write!(f, "reference space {ty:?} is not enabled for this session")
            }
            Self::MissingFloorTransform => {
                f.write_str("bounded floor space requires a device frame-of-reference transform")
            }
            Self::FeatureUnavailable(feature) => {
                write!(f, "required feature {feature:?} is not available")
            }
            Self::TransformDeclined(ty) => {
                write!(f, "device declined the transform for reference space {ty:?}")
            }
            Self::BoundedFloorUnavailable => f.write_str("bounded floor spaces are not supported"),
            Self::AnchorNotFound => f.write_str("no anchor stored under this handle"),
            Self::UnknownSession(id) => write!(f, "unknown session {id:?}"),
            Self::SessionEnded => f.write_str("session has ended"),
            Self::FrameInactive => f.write_str("frame used outside its active window"),
            Self::NotAnimationFrame => f.write_str("operation requires an animation frame"),
            Self::InlineFovOnImmersive => {
                f.write_str("inline field of view cannot be set on an immersive session")
            }
            Self::ForeignRenderTarget => f.write_str("render target belongs to another session"),
            Self::ForeignSpace => f.write_str("space belongs to another session"),
        }
    }
}

impl core::error::Error for SessionError {}

/// Outcome of an application callback or event listener.
///
/// An `Err` is reported through the trace sink and never interrupts the
/// remaining callbacks of the tick.
pub type CallbackResult = Result<(), Box<dyn core::error::Error>>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(SessionError::MissingFloorTransform.kind(), ErrorKind::Configuration);
        assert_eq!(
            SessionError::UnsupportedReferenceSpace(ReferenceSpaceType::Unbounded).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(SessionError::SessionEnded.kind(), ErrorKind::State);
        assert_eq!(SessionError::FrameInactive.kind(), ErrorKind::State);
        assert_eq!(SessionError::InlineFovOnImmersive.kind(), ErrorKind::Usage);
        assert_eq!(
            SessionError::FeatureUnavailable(Feature::HitTest).kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(
            SessionError::TransformDeclined(ReferenceSpaceType::Local).kind(),
            ErrorKind::NotSupported
        );
    }

    #[test]
    fn missing_floor_transform_is_distinct_from_unsupported() {
        assert_ne!(
            SessionError::MissingFloorTransform.kind(),
            SessionError::BoundedFloorUnavailable.kind()
        );
    }

    #[test]
    fn display_names_the_problem() {
        let msg = SessionError::UnsupportedMode(SessionMode::ImmersiveVr).to_string();
        assert!(msg.contains("ImmersiveVr"), "got {msg}");
        let boxed: Box<dyn core::error::Error> = Box::new(SessionError::SessionEnded);
        assert_eq!(boxed.to_string(), "session has ended");
    }
}
