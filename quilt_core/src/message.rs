// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed messages from a device to the runtime.

use crate::device::TickRequest;
use crate::input::RawInputEvent;
use crate::session::SessionId;
use crate::time::HostTime;

/// Something the device reports to [`Runtime::handle_message`].
///
/// [`Runtime::handle_message`]: crate::runtime::Runtime::handle_message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceMessage {
    /// An armed tick fired.
    Tick {
        /// Session the tick was requested for.
        session: SessionId,
        /// Token returned by [`Device::request_tick`](crate::device::Device::request_tick).
        request: TickRequest,
        /// Device time of the refresh.
        now: HostTime,
    },
    /// A raw select or squeeze transition.
    Input(RawInputEvent),
    /// The device ended a session on its own, for example because the
    /// headset was removed.
    SessionTerminated(SessionId),
}
