// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A deterministic simulated device for driving quilt runtimes.
//!
//! [`SimDevice`] implements [`Device`](quilt_core::device::Device) entirely
//! in memory. Tests and demos script its head pose, input sources, surfaces
//! and light-field configuration, then call [`pump`] to advance one display
//! refresh:
//!
//! ```
//! use quilt_core::feature::SessionInit;
//! use quilt_core::render_state::{RenderStatePatch, SurfaceId};
//! use quilt_core::runtime::Runtime;
//! use quilt_core::session::SessionMode;
//! use quilt_sim::{SimDevice, pump};
//!
//! let mut runtime = Runtime::new(SimDevice::new());
//! let id = runtime
//!     .request_session(SessionMode::Inline, &SessionInit::default())
//!     .unwrap();
//! let target = runtime.create_render_target(id, SurfaceId(0)).unwrap();
//! let session = runtime.session_mut(id).unwrap();
//! session
//!     .update_render_state(RenderStatePatch::default().target(target))
//!     .unwrap();
//! session.request_animation_frame(|_, _| Ok(())).unwrap();
//!
//! pump(&mut runtime);
//! assert_eq!(runtime.device().frames().len(), 1);
//! ```

#![no_std]

extern crate alloc;

mod device;

pub use device::{
    DEFAULT_FLOOR_HEIGHT, DEFAULT_FRAME_INTERVAL, DEFAULT_IPD, FrameRecord, InputPoses, SimDevice,
};

use quilt_core::runtime::Runtime;

/// Advances the device one refresh and hands every due message to the
/// runtime. Returns the number of messages delivered.
pub fn pump(runtime: &mut Runtime<SimDevice>) -> usize {
    let device = runtime.device_mut();
    let interval = device.frame_interval();
    device.advance(interval);
    let messages = device.drain_messages();
    let count = messages.len();
    for message in messages {
        runtime.handle_message(message);
    }
    count
}

/// Pumps `frames` refreshes.
pub fn pump_frames(runtime: &mut Runtime<SimDevice>, frames: usize) {
    for _ in 0..frames {
        pump(runtime);
    }
}
