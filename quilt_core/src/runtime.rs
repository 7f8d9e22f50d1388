// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The runtime: owns a device and every session created on it.
//!
//! [`Runtime`] is the entry point for applications and for device event
//! loops. Applications request sessions, reference spaces and render
//! targets through it; device crates feed it [`DeviceMessage`]s.
//!
//! At most one immersive session drives ticks at a time. It is called the
//! *exclusive* session. While one exists, every other session is
//! `Suspended`: inline sessions are suspended when it starts and resumed
//! when it ends, and further immersive sessions wait in request order.

use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;

use crate::device::Device;
use crate::error::SessionError;
use crate::event::{self, SessionEvent};
use crate::extension::{Anchor, AnchorStore};
use crate::feature::{Feature, FeatureSet, SessionInit};
use crate::frame::FrameId;
use crate::input::RawInputEvent;
use crate::message::DeviceMessage;
use crate::reference::{ReferenceSpace, ReferenceSpaceType};
use crate::render_state::{RenderTarget, SurfaceId};
use crate::session::{Session, SessionId, SessionMode, SessionState};
use crate::trace::{DroppedInputEvent, SessionStateEvent, TraceSink, Tracer};

/// Owns a device and the sessions running on it.
pub struct Runtime<D: Device> {
    pub(crate) device: D,
    pub(crate) sessions: Vec<Session>,
    exclusive: Option<SessionId>,
    inline_sessions: Vec<SessionId>,
    waiting_immersive: Vec<SessionId>,
    pub(crate) next_frame: u64,
    pub(crate) tracer: Tracer,
}

impl<D: Device> fmt::Debug for Runtime<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("sessions", &self.sessions.len())
            .field("exclusive", &self.exclusive)
            .field("inline_sessions", &self.inline_sessions)
            .field("waiting_immersive", &self.waiting_immersive)
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

impl<D: Device> Runtime<D> {
    /// Creates a runtime with no sessions and no trace sink.
    pub fn new(device: D) -> Self {
        Self {
            device,
            sessions: Vec::new(),
            exclusive: None,
            inline_sessions: Vec::new(),
            waiting_immersive: Vec::new(),
            next_frame: 0,
            tracer: Tracer::none(),
        }
    }

    /// Installs a trace sink, consuming and returning the runtime.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.set_trace_sink(sink);
        self
    }

    /// Installs (or replaces) the trace sink.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.tracer = Tracer::new(sink);
    }

    /// Returns the device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Returns the device mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The immersive session currently holding the device.
    pub fn exclusive_session(&self) -> Option<SessionId> {
        self.exclusive
    }

    /// Iterates over every session ever created, ended ones included.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    /// Whether sessions of `mode` can be created. Inline sessions always
    /// can.
    pub fn is_session_supported(&self, mode: SessionMode) -> bool {
        !mode.is_immersive() || self.device.is_session_supported(mode)
    }

    fn is_feature_supported(&self, feature: Feature) -> bool {
        feature == Feature::Viewer || self.device.is_feature_supported(feature)
    }

    /// Creates a session.
    ///
    /// The mode's default features and `init.required_features` must all be
    /// supported; unsupported optional features are left out. An immersive
    /// session requested while another holds the device starts `Suspended`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "a runtime never creates anywhere near u32::MAX sessions"
    )]
    pub fn request_session(
        &mut self,
        mode: SessionMode,
        init: &SessionInit,
    ) -> Result<SessionId, SessionError> {
        if !self.is_session_supported(mode) {
            return Err(SessionError::UnsupportedMode(mode));
        }
        let required = mode.required_features().union(init.required_features);
        if let Some(missing) = required.iter().find(|f| !self.is_feature_supported(*f)) {
            return Err(SessionError::FeatureUnavailable(missing));
        }
        let features: FeatureSet = required
            .iter()
            .chain(
                init.optional_features
                    .iter()
                    .filter(|f| self.is_feature_supported(*f)),
            )
            .collect();

        let id = SessionId(self.sessions.len() as u32);
        self.device.request_session(id, mode, features)?;

        let mut session = Session::new(id, mode, features, self.device.view_arrangement(mode));
        session.blend_mode = self.device.environment_blend_mode(mode);
        session.interaction_mode = self.device.interaction_mode(mode);
        let blocked = self.exclusive.is_some();
        if blocked {
            session.state = SessionState::Suspended;
        }
        self.sessions.push(session);

        if mode.is_immersive() {
            if blocked {
                self.waiting_immersive.push(id);
            } else {
                self.exclusive = Some(id);
                for other in self.inline_sessions.clone() {
                    self.suspend(other);
                }
                self.arm_tick(id);
            }
        } else {
            self.inline_sessions.push(id);
            if !blocked {
                self.arm_tick(id);
            }
        }
        Ok(id)
    }

    /// Returns a session.
    pub fn session(&self, id: SessionId) -> Result<&Session, SessionError> {
        self.sessions
            .get(id.index() as usize)
            .ok_or(SessionError::UnknownSession(id))
    }

    /// Returns a session mutably, to register callbacks and listeners or to
    /// patch its render state.
    pub fn session_mut(&mut self, id: SessionId) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(id.index() as usize)
            .ok_or(SessionError::UnknownSession(id))
    }

    /// Binds a renderer surface to a session.
    pub fn create_render_target(
        &self,
        id: SessionId,
        surface: SurfaceId,
    ) -> Result<RenderTarget, SessionError> {
        let session = self.session(id)?;
        if session.is_ended() {
            return Err(SessionError::SessionEnded);
        }
        Ok(session.create_render_target(surface))
    }

    /// Creates a reference space of type `ty` for a session.
    ///
    /// `Viewer` always returns the session's own viewer space. Other types
    /// must be enabled features; the device supplies their baseline.
    pub fn request_reference_space(
        &mut self,
        id: SessionId,
        ty: ReferenceSpaceType,
    ) -> Result<ReferenceSpace, SessionError> {
        let Self {
            device, sessions, ..
        } = self;
        let session = sessions
            .get_mut(id.index() as usize)
            .ok_or(SessionError::UnknownSession(id))?;
        if session.is_ended() {
            return Err(SessionError::SessionEnded);
        }
        if !session.features.contains(ty.feature()) {
            return Err(SessionError::UnsupportedReferenceSpace(ty));
        }
        if ty == ReferenceSpaceType::Viewer {
            return Ok(session.viewer);
        }
        let transform = device
            .frame_of_reference_transform(ty)
            .map_err(|_| SessionError::TransformDeclined(ty))?;
        ReferenceSpace::create(&mut session.spaces, ty, transform)
    }

    /// Recreates a persisted anchor from `store`.
    pub fn restore_anchor(
        &mut self,
        id: SessionId,
        store: &dyn AnchorStore,
        handle: &str,
    ) -> Result<Anchor, SessionError> {
        let session = self.session_mut(id)?;
        if session.is_ended() {
            return Err(SessionError::SessionEnded);
        }
        if !session.features.contains(Feature::Anchors) {
            return Err(SessionError::FeatureUnavailable(Feature::Anchors));
        }
        let pose = store.load(handle).ok_or(SessionError::AnchorNotFound)?;
        Ok(Anchor::create(&mut session.spaces, pose, handle.to_string()))
    }

    /// Ends a session. Ending an already ended session does nothing.
    pub fn end_session(&mut self, id: SessionId) -> Result<(), SessionError> {
        self.session(id)?;
        self.terminate(id);
        Ok(())
    }

    /// Processes one message from the device.
    pub fn handle_message(&mut self, message: DeviceMessage) {
        match message {
            DeviceMessage::Tick {
                session,
                request,
                now,
            } => {
                let current = self
                    .sessions
                    .get(session.index() as usize)
                    .filter(|s| s.state == SessionState::Active)
                    .and_then(|s| s.tick_request);
                // Superseded or cancelled requests may still fire.
                if current == Some(request) {
                    self.tick(session, now);
                }
            }
            DeviceMessage::Input(raw) => self.route_input(&raw),
            DeviceMessage::SessionTerminated(id) => self.terminate(id),
        }
    }

    pub(crate) fn next_frame_id(&mut self) -> FrameId {
        self.next_frame += 1;
        FrameId(self.next_frame)
    }

    fn route_input(&mut self, raw: &RawInputEvent) {
        let routed = self
            .sessions
            .get(raw.session.index() as usize)
            .filter(|s| s.state == SessionState::Active)
            .and_then(|s| s.router.route(raw));
        let Some(routed) = routed else {
            self.tracer.dropped_input(&DroppedInputEvent {
                session: raw.session,
                source: raw.source,
            });
            return;
        };
        for event in routed.events() {
            let frame = self.next_frame_id();
            self.dispatch(raw.session, event, Some(frame));
        }
    }

    fn dispatch(&mut self, id: SessionId, event: &SessionEvent, frame: Option<FrameId>) {
        let Self {
            device,
            sessions,
            tracer,
            ..
        } = self;
        if let Some(session) = sessions.get_mut(id.index() as usize) {
            event::dispatch(session, &*device, tracer, event, frame);
        }
    }

    fn arm_tick(&mut self, id: SessionId) {
        let request = self.device.request_tick(id);
        if let Some(session) = self.sessions.get_mut(id.index() as usize) {
            session.tick_request = Some(request);
        }
    }

    fn set_state(&mut self, id: SessionId, to: SessionState) -> bool {
        let Some(session) = self.sessions.get_mut(id.index() as usize) else {
            return false;
        };
        let from = session.state;
        if from == to || from == SessionState::Ended {
            return false;
        }
        session.state = to;
        self.tracer.session_state(&SessionStateEvent {
            session: id,
            from,
            to,
        });
        true
    }

    fn suspend(&mut self, id: SessionId) {
        if !self.set_state(id, SessionState::Suspended) {
            return;
        }
        if let Some(request) = self
            .sessions
            .get_mut(id.index() as usize)
            .and_then(|s| s.tick_request.take())
        {
            self.device.cancel_tick(request);
        }
        self.dispatch(id, &SessionEvent::Blur, None);
    }

    fn resume(&mut self, id: SessionId) {
        if !self.set_state(id, SessionState::Active) {
            return;
        }
        self.arm_tick(id);
        self.dispatch(id, &SessionEvent::Focus, None);
    }

    fn terminate(&mut self, id: SessionId) {
        let Some(request) = self
            .sessions
            .get_mut(id.index() as usize)
            .filter(|s| !s.is_ended())
            .map(|s| s.tick_request.take())
        else {
            return;
        };
        if let Some(request) = request {
            self.device.cancel_tick(request);
        }
        self.set_state(id, SessionState::Ended);
        self.device.end_session(id);
        self.dispatch(id, &SessionEvent::End, None);

        if let Some(session) = self.sessions.get_mut(id.index() as usize) {
            session.callbacks.clear();
            session.listeners.clear();
            session.pending_render_state = None;
            session.inputs.clear(&mut session.spaces);
        }
        self.inline_sessions.retain(|s| *s != id);
        self.waiting_immersive.retain(|s| *s != id);

        if self.exclusive == Some(id) {
            self.exclusive = None;
            if self.waiting_immersive.is_empty() {
                for inline in self.inline_sessions.clone() {
                    self.resume(inline);
                }
            } else {
                let next = self.waiting_immersive.remove(0);
                self.exclusive = Some(next);
                self.resume(next);
            }
        }
    }
}
