// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the session frame loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! runtime calls at each stage of a tick. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] owns an optional boxed sink. Two groups of events exist:
//!
//! - **Per-tick** events ([`TickEvent`], phase begin/end, render-state
//!   application, input-source changes, dropped input) are only delivered
//!   with the `trace` feature. Without it their `Tracer` methods compile to
//!   nothing.
//! - **Failure and lifecycle** events ([`CallbackErrorEvent`],
//!   [`SessionStateEvent`]) are always delivered when a sink is installed.
//!   They are the only record of an application callback returning `Err`.
//!
//! # Crate features
//!
//! - `trace` enables the per-tick `Tracer` method bodies (one branch per
//!   call).

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use crate::callbacks::FrameHandle;
use crate::event::ListenerId;
use crate::frame::FrameId;
use crate::input::InputSourceId;
use crate::session::{SessionId, SessionState};
use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a tick is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Promoting the pending render state.
    ApplyRenderState,
    /// Camera derivation and the device's frame-start notification.
    FrameStart,
    /// Running animation-frame callbacks.
    Dispatch,
    /// The device's frame-end notification.
    FrameEnd,
}

/// Where a failing callback was registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackOrigin {
    /// An animation-frame callback.
    AnimationFrame(FrameHandle),
    /// A session event listener.
    Listener(ListenerId),
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a tick reaches an active session, after the next tick has
/// been requested.
#[derive(Clone, Copy, Debug)]
pub struct TickEvent {
    /// Session being ticked.
    pub session: SessionId,
    /// Per-session tick counter, starting at 1.
    pub tick_index: u64,
    /// Device time of the tick.
    pub now: HostTime,
    /// Time since the session's previous tick, if any.
    pub interval: Option<Duration>,
}

/// Marks the beginning of a tick phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Session being ticked.
    pub session: SessionId,
    /// Per-session tick counter.
    pub tick_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Device time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a tick phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Session being ticked.
    pub session: SessionId,
    /// Per-session tick counter.
    pub tick_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Device time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted when a pending render state becomes active.
#[derive(Clone, Copy, Debug)]
pub struct RenderStateEvent {
    /// Session whose render state changed.
    pub session: SessionId,
    /// Tick at which it was applied.
    pub tick_index: u64,
    /// New near plane.
    pub depth_near: f64,
    /// New far plane.
    pub depth_far: f64,
    /// Whether a render target is attached.
    pub has_target: bool,
}

/// Emitted when a session's input-source set changes.
#[derive(Clone, Copy, Debug)]
pub struct InputSourcesEvent {
    /// Session whose sources changed.
    pub session: SessionId,
    /// Per-session tick counter.
    pub tick_index: u64,
    /// Number of sources added.
    pub added: u32,
    /// Number of sources removed.
    pub removed: u32,
}

/// Emitted when a raw input event matches no routable session.
#[derive(Clone, Copy, Debug)]
pub struct DroppedInputEvent {
    /// Session the device addressed.
    pub session: SessionId,
    /// Source that produced the event.
    pub source: InputSourceId,
}

/// Emitted on every session state transition.
#[derive(Clone, Copy, Debug)]
pub struct SessionStateEvent {
    /// Session that changed state.
    pub session: SessionId,
    /// Previous state.
    pub from: SessionState,
    /// New state.
    pub to: SessionState,
}

/// Emitted when a callback or listener returns `Err`.
#[derive(Clone, Debug)]
pub struct CallbackErrorEvent {
    /// Session the callback belongs to.
    pub session: SessionId,
    /// Frame it ran with, if any.
    pub frame: Option<FrameId>,
    /// Which callback failed.
    pub origin: CallbackOrigin,
    /// The error's `Display` output.
    pub message: String,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the runtime.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a tick reaches an active session.
    fn on_tick(&mut self, e: &TickEvent) {
        _ = e;
    }

    /// Called at the beginning of a tick phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a tick phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a pending render state is applied.
    fn on_render_state(&mut self, e: &RenderStateEvent) {
        _ = e;
    }

    /// Called when a session's input sources change.
    fn on_input_sources(&mut self, e: &InputSourcesEvent) {
        _ = e;
    }

    /// Called when a raw input event is dropped.
    fn on_dropped_input(&mut self, e: &DroppedInputEvent) {
        _ = e;
    }

    /// Called on every session state transition.
    fn on_session_state(&mut self, e: &SessionStateEvent) {
        _ = e;
    }

    /// Called when a callback or listener fails.
    fn on_callback_error(&mut self, e: &CallbackErrorEvent) {
        _ = e;
    }
}

/// Shares one sink between the runtime and the code that inspects it.
impl<S: TraceSink> TraceSink for Rc<RefCell<S>> {
    fn on_tick(&mut self, e: &TickEvent) {
        self.borrow_mut().on_tick(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.borrow_mut().on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.borrow_mut().on_phase_end(e);
    }

    fn on_render_state(&mut self, e: &RenderStateEvent) {
        self.borrow_mut().on_render_state(e);
    }

    fn on_input_sources(&mut self, e: &InputSourcesEvent) {
        self.borrow_mut().on_input_sources(e);
    }

    fn on_dropped_input(&mut self, e: &DroppedInputEvent) {
        self.borrow_mut().on_dropped_input(e);
    }

    fn on_session_state(&mut self, e: &SessionStateEvent) {
        self.borrow_mut().on_session_state(e);
    }

    fn on_callback_error(&mut self, e: &CallbackErrorEvent) {
        self.borrow_mut().on_callback_error(e);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owned wrapper around an optional [`TraceSink`].
#[derive(Default)]
pub struct Tracer {
    sink: Option<Box<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer")
            .field("installed", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

macro_rules! per_tick {
    ($(#[$doc:meta])* $name:ident, $method:ident, $event:ty) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: &$event) {
            #[cfg(feature = "trace")]
            if let Some(s) = &mut self.sink {
                s.$method(e);
            }
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self { sink: None }
    }

    /// Removes and returns the installed sink.
    pub fn take_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        self.sink.take()
    }

    per_tick!(
        /// Emits a [`TickEvent`].
        tick, on_tick, TickEvent
    );
    per_tick!(
        /// Emits a [`PhaseBeginEvent`].
        phase_begin, on_phase_begin, PhaseBeginEvent
    );
    per_tick!(
        /// Emits a [`PhaseEndEvent`].
        phase_end, on_phase_end, PhaseEndEvent
    );
    per_tick!(
        /// Emits a [`RenderStateEvent`].
        render_state, on_render_state, RenderStateEvent
    );
    per_tick!(
        /// Emits an [`InputSourcesEvent`].
        input_sources, on_input_sources, InputSourcesEvent
    );
    per_tick!(
        /// Emits a [`DroppedInputEvent`].
        dropped_input, on_dropped_input, DroppedInputEvent
    );

    /// Emits a [`SessionStateEvent`]. Delivered regardless of the `trace`
    /// feature.
    #[inline]
    pub fn session_state(&mut self, e: &SessionStateEvent) {
        if let Some(s) = &mut self.sink {
            s.on_session_state(e);
        }
    }

    /// Emits a [`CallbackErrorEvent`]. Delivered regardless of the `trace`
    /// feature.
    #[inline]
    pub fn callback_error(&mut self, e: &CallbackErrorEvent) {
        if let Some(s) = &mut self.sink {
            s.on_callback_error(e);
        }
    }
}
