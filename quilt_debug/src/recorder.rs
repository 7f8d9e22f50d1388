// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records. [`decode`] reads them back as an
//! iterator of [`RecordedEvent`].
//!
//! Identifiers are stored as their raw values, so decoded events carry plain
//! integers instead of the runtime's handle types. Callback error messages
//! are stored as length-prefixed UTF-8.

use quilt_core::session::SessionState;
use quilt_core::trace::{
    CallbackErrorEvent, CallbackOrigin, DroppedInputEvent, InputSourcesEvent, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, RenderStateEvent, SessionStateEvent, TickEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_TICK: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_RENDER_STATE: u8 = 4;
const TAG_INPUT_SOURCES: u8 = 5;
const TAG_DROPPED_INPUT: u8 = 6;
const TAG_SESSION_STATE: u8 = 7;
const TAG_CALLBACK_ERROR: u8 = 8;

const ORIGIN_ANIMATION_FRAME: u8 = 0;
const ORIGIN_LISTENER: u8 = 1;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_option_u64(&mut self, v: Option<u64>) {
        match v {
            Some(val) => {
                self.write_u8(1);
                self.write_u64(val);
            }
            None => {
                self.write_u8(0);
                self.write_u64(0);
            }
        }
    }

    fn write_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        #[expect(
            clippy::cast_possible_truncation,
            reason = "messages are cut at u32::MAX bytes for recording"
        )]
        let len = bytes.len().min(u32::MAX as usize) as u32;
        self.write_u32(len);
        self.buf.extend_from_slice(&bytes[..len as usize]);
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::ApplyRenderState => 0,
            PhaseKind::FrameStart => 1,
            PhaseKind::Dispatch => 2,
            PhaseKind::FrameEnd => 3,
        });
    }

    fn write_state(&mut self, s: SessionState) {
        self.write_u8(match s {
            SessionState::Active => 0,
            SessionState::Suspended => 1,
            SessionState::Ended => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_tick(&mut self, e: &TickEvent) {
        self.write_u8(TAG_TICK);
        self.write_u32(e.session.index());
        self.write_u64(e.tick_index);
        self.write_u64(e.now.ticks());
        self.write_option_u64(e.interval.map(|d| d.ticks()));
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u32(e.session.index());
        self.write_u64(e.tick_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u32(e.session.index());
        self.write_u64(e.tick_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_render_state(&mut self, e: &RenderStateEvent) {
        self.write_u8(TAG_RENDER_STATE);
        self.write_u32(e.session.index());
        self.write_u64(e.tick_index);
        self.write_f64(e.depth_near);
        self.write_f64(e.depth_far);
        self.write_u8(u8::from(e.has_target));
    }

    fn on_input_sources(&mut self, e: &InputSourcesEvent) {
        self.write_u8(TAG_INPUT_SOURCES);
        self.write_u32(e.session.index());
        self.write_u64(e.tick_index);
        self.write_u32(e.added);
        self.write_u32(e.removed);
    }

    fn on_dropped_input(&mut self, e: &DroppedInputEvent) {
        self.write_u8(TAG_DROPPED_INPUT);
        self.write_u32(e.session.index());
        self.write_u32(e.source.0);
    }

    fn on_session_state(&mut self, e: &SessionStateEvent) {
        self.write_u8(TAG_SESSION_STATE);
        self.write_u32(e.session.index());
        self.write_state(e.from);
        self.write_state(e.to);
    }

    fn on_callback_error(&mut self, e: &CallbackErrorEvent) {
        self.write_u8(TAG_CALLBACK_ERROR);
        self.write_u32(e.session.index());
        self.write_option_u64(e.frame.map(|f| f.get()));
        match e.origin {
            CallbackOrigin::AnimationFrame(handle) => {
                self.write_u8(ORIGIN_ANIMATION_FRAME);
                self.write_u32(handle.get());
            }
            CallbackOrigin::Listener(id) => {
                self.write_u8(ORIGIN_LISTENER);
                self.write_u32(id.get());
            }
        }
        self.write_str(&e.message);
    }
}

// ---------------------------------------------------------------------------
// Decoded events
// ---------------------------------------------------------------------------

/// A decoded [`TickEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedTick {
    /// Raw session index.
    pub session: u32,
    /// Per-session tick counter.
    pub tick_index: u64,
    /// Device time in ticks.
    pub now: u64,
    /// Ticks since the previous tick, if any.
    pub interval: Option<u64>,
}

/// A decoded phase boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedPhase {
    /// Raw session index.
    pub session: u32,
    /// Per-session tick counter.
    pub tick_index: u64,
    /// Which phase.
    pub phase: PhaseKind,
    /// Device time in ticks.
    pub timestamp: u64,
}

/// A decoded [`RenderStateEvent`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedRenderState {
    /// Raw session index.
    pub session: u32,
    /// Tick at which the state was applied.
    pub tick_index: u64,
    /// Near plane.
    pub depth_near: f64,
    /// Far plane.
    pub depth_far: f64,
    /// Whether a render target was attached.
    pub has_target: bool,
}

/// Where a recorded callback error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordedOrigin {
    /// Raw animation-frame handle.
    AnimationFrame(u32),
    /// Raw listener id.
    Listener(u32),
}

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A [`TickEvent`].
    Tick(RecordedTick),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(RecordedPhase),
    /// A [`PhaseEndEvent`].
    PhaseEnd(RecordedPhase),
    /// A [`RenderStateEvent`].
    RenderState(RecordedRenderState),
    /// An [`InputSourcesEvent`].
    InputSources {
        /// Raw session index.
        session: u32,
        /// Per-session tick counter.
        tick_index: u64,
        /// Sources added.
        added: u32,
        /// Sources removed.
        removed: u32,
    },
    /// A [`DroppedInputEvent`].
    DroppedInput {
        /// Raw session index.
        session: u32,
        /// Raw input source id.
        source: u32,
    },
    /// A [`SessionStateEvent`].
    SessionState {
        /// Raw session index.
        session: u32,
        /// Previous state.
        from: SessionState,
        /// New state.
        to: SessionState,
    },
    /// A [`CallbackErrorEvent`].
    CallbackError {
        /// Raw session index.
        session: u32,
        /// Raw frame id, if the callback ran with a frame.
        frame: Option<u64>,
        /// Which callback failed.
        origin: RecordedOrigin,
        /// The error message.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events. Stops at the first unknown tag or
/// truncated record.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take(&mut self, n: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        Some(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_f64(&mut self) -> Option<f64> {
        Some(f64::from_bits(self.read_u64()?))
    }

    fn read_option_u64(&mut self) -> Option<Option<u64>> {
        let present = self.read_u8()?;
        let val = self.read_u64()?;
        Some((present != 0).then_some(val))
    }

    fn read_str(&mut self) -> Option<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::ApplyRenderState,
            1 => PhaseKind::FrameStart,
            2 => PhaseKind::Dispatch,
            _ => PhaseKind::FrameEnd,
        })
    }

    fn read_state(&mut self) -> Option<SessionState> {
        Some(match self.read_u8()? {
            0 => SessionState::Active,
            1 => SessionState::Suspended,
            _ => SessionState::Ended,
        })
    }

    fn decode_phase(&mut self) -> Option<RecordedPhase> {
        Some(RecordedPhase {
            session: self.read_u32()?,
            tick_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_u64()?,
        })
    }

    fn decode_tick(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Tick(RecordedTick {
            session: self.read_u32()?,
            tick_index: self.read_u64()?,
            now: self.read_u64()?,
            interval: self.read_option_u64()?,
        }))
    }

    fn decode_render_state(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RenderState(RecordedRenderState {
            session: self.read_u32()?,
            tick_index: self.read_u64()?,
            depth_near: self.read_f64()?,
            depth_far: self.read_f64()?,
            has_target: self.read_u8()? != 0,
        }))
    }

    fn decode_input_sources(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::InputSources {
            session: self.read_u32()?,
            tick_index: self.read_u64()?,
            added: self.read_u32()?,
            removed: self.read_u32()?,
        })
    }

    fn decode_dropped_input(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::DroppedInput {
            session: self.read_u32()?,
            source: self.read_u32()?,
        })
    }

    fn decode_session_state(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SessionState {
            session: self.read_u32()?,
            from: self.read_state()?,
            to: self.read_state()?,
        })
    }

    fn decode_callback_error(&mut self) -> Option<RecordedEvent> {
        let session = self.read_u32()?;
        let frame = self.read_option_u64()?;
        let origin = match self.read_u8()? {
            ORIGIN_ANIMATION_FRAME => RecordedOrigin::AnimationFrame(self.read_u32()?),
            ORIGIN_LISTENER => RecordedOrigin::Listener(self.read_u32()?),
            _ => return None,
        };
        let message = self.read_str()?;
        Some(RecordedEvent::CallbackError {
            session,
            frame,
            origin,
            message,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_TICK => self.decode_tick(),
            TAG_PHASE_BEGIN => self.decode_phase().map(RecordedEvent::PhaseBegin),
            TAG_PHASE_END => self.decode_phase().map(RecordedEvent::PhaseEnd),
            TAG_RENDER_STATE => self.decode_render_state(),
            TAG_INPUT_SOURCES => self.decode_input_sources(),
            TAG_DROPPED_INPUT => self.decode_dropped_input(),
            TAG_SESSION_STATE => self.decode_session_state(),
            TAG_CALLBACK_ERROR => self.decode_callback_error(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
