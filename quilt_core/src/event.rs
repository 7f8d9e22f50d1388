// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Session events and listener dispatch.

use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;

use crate::device::Device;
use crate::error::CallbackResult;
use crate::frame::{Frame, FrameId, FrameKind};
use crate::input::{InputSourceId, InputSourcesChange};
use crate::session::Session;
use crate::trace::{CallbackErrorEvent, CallbackOrigin, Tracer};

/// Something that happened to a session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The session ended. Always the last event a session delivers.
    End,
    /// The session was suspended because another session took the device.
    Blur,
    /// The session resumed.
    Focus,
    /// Input sources were added or removed since the previous tick.
    InputSourcesChange(InputSourcesChange),
    /// A select action began.
    SelectStart {
        /// The source that produced it.
        source: InputSourceId,
    },
    /// A select action ended.
    SelectEnd {
        /// The source that produced it.
        source: InputSourceId,
    },
    /// A select action completed. Follows [`SelectEnd`](Self::SelectEnd).
    Select {
        /// The source that produced it.
        source: InputSourceId,
    },
    /// A squeeze action began.
    SqueezeStart {
        /// The source that produced it.
        source: InputSourceId,
    },
    /// A squeeze action ended.
    SqueezeEnd {
        /// The source that produced it.
        source: InputSourceId,
    },
    /// A squeeze action completed. Follows [`SqueezeEnd`](Self::SqueezeEnd).
    Squeeze {
        /// The source that produced it.
        source: InputSourceId,
    },
}

impl SessionEvent {
    /// A short lowercase name, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::End => "end",
            Self::Blur => "blur",
            Self::Focus => "focus",
            Self::InputSourcesChange(_) => "inputsourceschange",
            Self::SelectStart { .. } => "selectstart",
            Self::SelectEnd { .. } => "selectend",
            Self::Select { .. } => "select",
            Self::SqueezeStart { .. } => "squeezestart",
            Self::SqueezeEnd { .. } => "squeezeend",
            Self::Squeeze { .. } => "squeeze",
        }
    }
}

/// Identifies a registered listener so it can be removed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u32);

impl ListenerId {
    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// A session event listener.
///
/// Input events carry a transient [`Frame`] that is only active while the
/// listener runs. Lifecycle events carry none.
pub type EventListener = Box<dyn FnMut(&SessionEvent, Option<&mut Frame<'_>>) -> CallbackResult>;

/// A session's registered listeners.
///
/// During dispatch the entries are moved out. Listeners added meanwhile land
/// in `entries` and first run on the next event; listeners removed meanwhile
/// are skipped for the rest of the current event.
#[derive(Default)]
pub(crate) struct ListenerList {
    next_id: u32,
    entries: Vec<(ListenerId, EventListener)>,
    dispatching: bool,
    removed: Vec<ListenerId>,
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.entries.len())
            .field("dispatching", &self.dispatching)
            .finish_non_exhaustive()
    }
}

impl ListenerList {
    pub(crate) fn add(&mut self, listener: EventListener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) {
        if let Some(pos) = self.entries.iter().position(|(l, _)| *l == id) {
            self.entries.remove(pos);
        } else if self.dispatching {
            self.removed.push(id);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.removed.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn begin(&mut self) -> Vec<(ListenerId, EventListener)> {
        self.dispatching = true;
        core::mem::take(&mut self.entries)
    }

    fn is_removed(&self, id: ListenerId) -> bool {
        self.removed.contains(&id)
    }

    fn finish(&mut self, mut entries: Vec<(ListenerId, EventListener)>) {
        let removed = core::mem::take(&mut self.removed);
        entries.retain(|(id, _)| !removed.contains(id));
        entries.append(&mut self.entries);
        self.entries = entries;
        self.dispatching = false;
    }
}

/// Delivers `event` to every listener of `session`.
///
/// With `frame`, each listener receives a transient input frame that is
/// deactivated once dispatch completes. A listener returning `Err` is
/// reported to `tracer` and the remaining listeners still run.
pub(crate) fn dispatch(
    session: &mut Session,
    device: &dyn Device,
    tracer: &mut Tracer,
    event: &SessionEvent,
    frame: Option<FrameId>,
) {
    let session_id = session.id();
    let mut entries = session.listeners.begin();
    match frame {
        Some(frame_id) => {
            let mut frame = Frame::new(frame_id, FrameKind::Input, session, device);
            for (id, listener) in &mut entries {
                if frame.session.listeners.is_removed(*id) {
                    continue;
                }
                if let Err(err) = listener(event, Some(&mut frame)) {
                    tracer.callback_error(&CallbackErrorEvent {
                        session: session_id,
                        frame: Some(frame_id),
                        origin: CallbackOrigin::Listener(*id),
                        message: err.to_string(),
                    });
                }
            }
            frame.deactivate();
        }
        None => {
            for (id, listener) in &mut entries {
                if session.listeners.is_removed(*id) {
                    continue;
                }
                if let Err(err) = listener(event, None) {
                    tracer.callback_error(&CallbackErrorEvent {
                        session: session_id,
                        frame: None,
                        origin: CallbackOrigin::Listener(*id),
                        message: err.to_string(),
                    });
                }
            }
        }
    }
    session.listeners.finish(entries);
}
