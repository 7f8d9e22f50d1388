// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coordinate spaces, frame scheduling and light-field cameras for XR
//! sessions.
//!
//! `quilt_core` sits between a tracking/display device and the applications
//! rendering on it. It resolves coordinate spaces against the device's
//! tracking data, runs each session's frame loop, derives the camera array
//! of multi-view (light-field) displays and routes raw input to sessions.
//! It is `no_std` compatible (with `alloc`).
//!
//! # Architecture
//!
//! The crate is organized around a tick-driven frame loop:
//!
//! ```text
//!   Device (tick source, tracking)
//!       │
//!       ▼
//!   DeviceMessage ──► Runtime::handle_message()
//!                         │
//!          ┌──────────────┼────────────────────┐
//!          ▼              ▼                    ▼
//!        Tick        Input event        SessionTerminated
//!          │              │
//!          ▼              ▼
//!   CameraArray::update   InputRouter::route()
//!          │              │
//!          ▼              ▼
//!   animation Frame   transient input Frame
//!          │              │
//!          └──────┬───────┘
//!                 ▼
//!   Frame::viewer_pose() / Frame::pose() ──► SpaceStore::relative_transform()
//! ```
//!
//! **[`runtime`]** owns the device and every [`Session`](session::Session).
//! It resolves session features, enforces that only one immersive session
//! drives ticks at a time, and creates reference spaces.
//!
//! **[`session`]** holds per-application state: callbacks, render state,
//! spaces, listeners. Its state machine is `Active`, `Suspended`, `Ended`.
//!
//! **[`frame`]** is the window in which poses are queried. Frames borrow
//! their session and are deactivated once dispatch completes.
//!
//! **[`space`]** and **[`reference`]** implement transform resolution.
//! Each space stores one authoritative matrix, resolves at most once per
//! frame, and composes with any other resolved space.
//!
//! **[`multiview`]** derives per-view view and projection matrices for
//! light-field displays, caching configuration-dependent work through
//! **[`dirty`]** channels.
//!
//! **[`input`]** tracks input sources and maps raw select/squeeze
//! transitions onto [`SessionEvent`](event::SessionEvent)s.
//!
//! **[`device`]** is the contract device crates implement, and
//! **[`message`]** the typed messages they send.
//!
//! **[`extension`]** holds the collaborator traits for hit testing, plane
//! detection, light estimation and anchor storage.
//!
//! **[`trace`]** provides the [`TraceSink`](trace::TraceSink) trait and
//! event types for frame-loop instrumentation.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables the per-tick `Tracer` method
//!   bodies (one branch per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod callbacks;
pub mod device;
pub mod dirty;
pub mod error;
pub mod event;
pub mod extension;
pub mod feature;
pub mod frame;
pub mod input;
pub mod message;
pub mod multiview;
pub mod reference;
pub mod render_state;
pub mod rigid;
pub mod runtime;
mod scheduler;
pub mod session;
pub mod space;
pub mod time;
pub mod trace;
pub mod transform;

#[cfg(test)]
mod testing;
