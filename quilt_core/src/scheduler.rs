// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-tick frame scheduling.
//!
//! Every tick of an `Active` session runs the same sequence:
//!
//! 1. Request the next tick, before anything else can fail.
//! 2. Promote the pending render state, if any.
//! 3. Without a render target, stop. The tick still counts.
//! 4. Move the callback queue into a dispatch snapshot.
//! 5. Allocate a frame id.
//! 6. Derive light-field cameras and notify the device of frame start.
//! 7. Diff input sources and announce changes.
//! 8. Run the snapshot in FIFO order, skipping cancelled entries.
//! 9. Deactivate the frame.
//! 10. Notify the device of frame end.

use alloc::string::ToString;

use crate::device::Device;
use crate::event::{self, SessionEvent};
use crate::frame::{Frame, FrameId, FrameKind};
use crate::runtime::Runtime;
use crate::session::SessionId;
use crate::time::HostTime;
use crate::trace::{
    CallbackErrorEvent, CallbackOrigin, InputSourcesEvent, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, RenderStateEvent, TickEvent, Tracer,
};

fn begin(tracer: &mut Tracer, session: SessionId, tick_index: u64, phase: PhaseKind, now: HostTime) {
    tracer.phase_begin(&PhaseBeginEvent {
        session,
        tick_index,
        phase,
        timestamp: now,
    });
}

fn end(tracer: &mut Tracer, session: SessionId, tick_index: u64, phase: PhaseKind, now: HostTime) {
    tracer.phase_end(&PhaseEndEvent {
        session,
        tick_index,
        phase,
        timestamp: now,
    });
}

impl<D: Device> Runtime<D> {
    /// Runs one tick of session `id` at device time `now`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "input-source counts are tiny"
    )]
    pub(crate) fn tick(&mut self, id: SessionId, now: HostTime) {
        let Self {
            device,
            sessions,
            tracer,
            next_frame,
            ..
        } = self;
        let Some(session) = sessions.get_mut(id.index() as usize) else {
            return;
        };

        session.tick_request = Some(device.request_tick(id));
        session.ticks += 1;
        let tick_index = session.ticks;
        let interval = session
            .last_tick
            .map(|prev| now.saturating_duration_since(prev));
        session.last_tick = Some(now);
        tracer.tick(&TickEvent {
            session: id,
            tick_index,
            now,
            interval,
        });

        if let Some(pending) = session.pending_render_state.take() {
            begin(tracer, id, tick_index, PhaseKind::ApplyRenderState, device.now());
            session.render_state = pending;
            if let Some(target) = pending.target {
                device.on_render_target_set(id, &target);
            }
            tracer.render_state(&RenderStateEvent {
                session: id,
                tick_index,
                depth_near: pending.depth_near,
                depth_far: pending.depth_far,
                has_target: pending.has_target(),
            });
            end(tracer, id, tick_index, PhaseKind::ApplyRenderState, device.now());
        }

        if !session.render_state.has_target() {
            return;
        }

        let mut snapshot = session.callbacks.begin_dispatch();
        *next_frame += 1;
        let frame_id = FrameId(*next_frame);
        session.frames += 1;

        begin(tracer, id, tick_index, PhaseKind::FrameStart, device.now());
        if let (Some(cameras), Some(config)) = (session.cameras.as_mut(), device.multiview_config()) {
            session.camera_update = Some(cameras.update(
                &config,
                &device.tracked_pose(),
                session.render_state.depth_near,
                session.render_state.depth_far,
            ));
        }
        device.on_frame_start(id, &session.render_state, session.cameras.as_ref());
        end(tracer, id, tick_index, PhaseKind::FrameStart, device.now());

        if let Some(change) = session.inputs.sync(device.input_sources(), &mut session.spaces) {
            tracer.input_sources(&InputSourcesEvent {
                session: id,
                tick_index,
                added: change.added.len() as u32,
                removed: change.removed.len() as u32,
            });
            event::dispatch(
                session,
                &*device,
                tracer,
                &SessionEvent::InputSourcesChange(change),
                None,
            );
        }

        begin(tracer, id, tick_index, PhaseKind::Dispatch, device.now());
        let mut frame = Frame::new(frame_id, FrameKind::Animation, session, &*device);
        for queued in &mut snapshot {
            if frame.session.callbacks.is_cancelled(queued.handle) {
                continue;
            }
            if let Err(err) = (queued.callback)(now, &mut frame) {
                tracer.callback_error(&CallbackErrorEvent {
                    session: id,
                    frame: Some(frame_id),
                    origin: CallbackOrigin::AnimationFrame(queued.handle),
                    message: err.to_string(),
                });
            }
        }
        frame.deactivate();
        session.callbacks.end_dispatch();
        end(tracer, id, tick_index, PhaseKind::Dispatch, device.now());

        begin(tracer, id, tick_index, PhaseKind::FrameEnd, device.now());
        device.on_frame_end(id);
        end(tracer, id, tick_index, PhaseKind::FrameEnd, device.now());
    }
}
