// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use quilt_core::session::SessionState;
use quilt_core::time::{HostTime, Timebase};
use quilt_core::trace::{
    CallbackErrorEvent, CallbackOrigin, DroppedInputEvent, InputSourcesEvent, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, RenderStateEvent, SessionStateEvent, TickEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns its writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn us(&self, t: HostTime) -> f64 {
        t.to_nanos(self.timebase) as f64 / 1000.0
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::ApplyRenderState => "render-state",
        PhaseKind::FrameStart => "frame-start",
        PhaseKind::Dispatch => "dispatch",
        PhaseKind::FrameEnd => "frame-end",
    }
}

fn state_name(state: SessionState) -> &'static str {
    match state {
        SessionState::Active => "active",
        SessionState::Suspended => "suspended",
        SessionState::Ended => "ended",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_tick(&mut self, e: &TickEvent) {
        let interval = match e.interval {
            Some(d) => format!("{:.1}µs", d.to_nanos(self.timebase) as f64 / 1000.0),
            None => "-".to_owned(),
        };
        let _ = writeln!(
            self.writer,
            "[tick] session={} tick={} now={:.1}µs interval={interval}",
            e.session.index(),
            e.tick_index,
            self.us(e.now),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] session={} tick={} {} at {:.1}µs",
            e.session.index(),
            e.tick_index,
            phase_name(e.phase),
            self.us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] session={} tick={} {} at {:.1}µs",
            e.session.index(),
            e.tick_index,
            phase_name(e.phase),
            self.us(e.timestamp),
        );
    }

    fn on_render_state(&mut self, e: &RenderStateEvent) {
        let _ = writeln!(
            self.writer,
            "[render-state] session={} tick={} near={} far={} target={}",
            e.session.index(),
            e.tick_index,
            e.depth_near,
            e.depth_far,
            if e.has_target { "yes" } else { "no" },
        );
    }

    fn on_input_sources(&mut self, e: &InputSourcesEvent) {
        let _ = writeln!(
            self.writer,
            "[inputs] session={} tick={} +{} -{}",
            e.session.index(),
            e.tick_index,
            e.added,
            e.removed,
        );
    }

    fn on_dropped_input(&mut self, e: &DroppedInputEvent) {
        let _ = writeln!(
            self.writer,
            "[input:dropped] session={} source={}",
            e.session.index(),
            e.source.0,
        );
    }

    fn on_session_state(&mut self, e: &SessionStateEvent) {
        let _ = writeln!(
            self.writer,
            "[state] session={} {} -> {}",
            e.session.index(),
            state_name(e.from),
            state_name(e.to),
        );
    }

    fn on_callback_error(&mut self, e: &CallbackErrorEvent) {
        let origin = match e.origin {
            CallbackOrigin::AnimationFrame(h) => format!("frame-callback#{}", h.get()),
            CallbackOrigin::Listener(l) => format!("listener#{}", l.get()),
        };
        let frame = e
            .frame
            .map_or_else(|| "-".to_owned(), |f| f.get().to_string());
        let _ = writeln!(
            self.writer,
            "[ERROR] session={} frame={frame} {origin}: {}",
            e.session.index(),
            e.message,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_core::feature::SessionInit;
    use quilt_core::render_state::{RenderStatePatch, SurfaceId};
    use quilt_core::runtime::Runtime;
    use quilt_core::session::SessionMode;
    use quilt_sim::{SimDevice, pump};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A cloneable in-memory writer.
    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn prints_one_line_per_event() {
        let out = Shared::default();
        let sink = PrettyPrintSink::with_writer(out.clone(), Timebase::NANOS);
        let mut runtime = Runtime::new(SimDevice::new()).with_trace_sink(Box::new(sink));
        let id = runtime
            .request_session(SessionMode::Inline, &SessionInit::default())
            .unwrap();
        let target = runtime.create_render_target(id, SurfaceId(1)).unwrap();
        let session = runtime.session_mut(id).unwrap();
        session
            .update_render_state(RenderStatePatch::default().target(target))
            .unwrap();
        session
            .request_animation_frame(|_, _| Err("shader compile failed".into()))
            .unwrap();
        pump(&mut runtime);
        runtime.end_session(id).unwrap();

        let text = String::from_utf8(out.0.borrow().clone()).unwrap();
        assert!(text.contains("[tick] session=0 tick=1"), "got: {text}");
        assert!(text.contains("target=yes"), "got: {text}");
        assert!(text.contains("[phase:begin] session=0 tick=1 dispatch"), "got: {text}");
        assert!(
            text.contains("frame-callback#") && text.contains("shader compile failed"),
            "got: {text}"
        );
        assert!(text.ends_with("[state] session=0 active -> ended\n"), "got: {text}");
    }
}
