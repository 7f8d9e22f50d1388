// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//! Each session becomes its own thread track; phases become duration slices.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use quilt_core::time::Timebase;

use crate::recorder::{RecordedEvent, RecordedOrigin, RecordedPhase, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
/// Events recorded without a timestamp (state changes, errors, dropped
/// input) take the time of the most recent timestamped event.
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut last_ts = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::Tick(e) => {
                last_ts = ticks_to_us(e.now, timebase);
                events.push(json!({
                    "ph": "i",
                    "name": "Tick",
                    "cat": "Scheduler",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": e.session,
                    "s": "t",
                    "args": {
                        "tick_index": e.tick_index,
                        "interval_us": e.interval.map(|t| ticks_to_us(t, timebase)),
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                last_ts = ticks_to_us(e.timestamp, timebase);
                events.push(phase_slice("B", &e, last_ts));
            }
            RecordedEvent::PhaseEnd(e) => {
                last_ts = ticks_to_us(e.timestamp, timebase);
                events.push(phase_slice("E", &e, last_ts));
            }
            RecordedEvent::RenderState(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RenderState",
                    "cat": "Frame",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": e.session,
                    "s": "t",
                    "args": {
                        "tick_index": e.tick_index,
                        "depth_near": e.depth_near,
                        "depth_far": e.depth_far,
                        "has_target": e.has_target,
                    }
                }));
            }
            RecordedEvent::InputSources {
                session,
                tick_index,
                added,
                removed,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": "InputSources",
                    "cat": "Input",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": session,
                    "s": "t",
                    "args": {
                        "tick_index": tick_index,
                        "added": added,
                        "removed": removed,
                    }
                }));
            }
            RecordedEvent::DroppedInput { session, source } => {
                events.push(json!({
                    "ph": "i",
                    "name": "DroppedInput",
                    "cat": "Input",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": session,
                    "s": "t",
                    "args": {
                        "source": source,
                    }
                }));
            }
            RecordedEvent::SessionState { session, from, to } => {
                events.push(json!({
                    "ph": "i",
                    "name": "SessionState",
                    "cat": "Lifecycle",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": session,
                    "s": "p",
                    "args": {
                        "from": format!("{from:?}"),
                        "to": format!("{to:?}"),
                    }
                }));
            }
            RecordedEvent::CallbackError {
                session,
                frame,
                origin,
                message,
            } => {
                let origin = match origin {
                    RecordedOrigin::AnimationFrame(h) => format!("animation-frame#{h}"),
                    RecordedOrigin::Listener(l) => format!("listener#{l}"),
                };
                events.push(json!({
                    "ph": "i",
                    "name": "CallbackError",
                    "cat": "Error",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": session,
                    "s": "t",
                    "args": {
                        "frame": frame,
                        "origin": origin,
                        "message": message,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn phase_slice(ph: &str, e: &RecordedPhase, ts: f64) -> Value {
    json!({
        "ph": ph,
        "name": format!("{:?}", e.phase),
        "cat": "Frame",
        "ts": ts,
        "pid": 0,
        "tid": e.session,
        "args": {
            "tick_index": e.tick_index,
        }
    })
}

fn ticks_to_us(ticks: u64, timebase: Timebase) -> f64 {
    timebase.ticks_to_nanos(ticks) as f64 / 1000.0
}
