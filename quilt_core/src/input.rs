// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input sources and the input event router.
//!
//! The device reports its current input sources every tick. Each session
//! keeps an [`InputSourceSet`] snapshot, diffs it once per tick, and owns the
//! target-ray (and, for tracked pointers, grip) space of every source it
//! knows about.
//!
//! Raw select and squeeze events arrive as [`RawInputEvent`]s. An
//! [`InputRouter`] turns the ones addressed to its session into semantic
//! [`SessionEvent`]s: an *end* event always also produces the base event, so
//! a completed press reads `SelectEnd` then `Select`.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::event::SessionEvent;
use crate::session::SessionId;
use crate::space::{SpaceId, SpaceRole, SpaceStore};

/// Identifies an input source for as long as the device reports it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputSourceId(pub u32);

impl fmt::Debug for InputSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputSourceId({})", self.0)
    }
}

/// Which hand holds an input source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Handedness {
    /// Not associated with a hand.
    #[default]
    None,
    /// Left hand.
    Left,
    /// Right hand.
    Right,
}

/// How an input source's target ray is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetRayMode {
    /// Follows the viewer's gaze.
    Gaze,
    /// A tracked controller or hand.
    TrackedPointer,
    /// A touch or click on the display surface.
    Screen,
}

/// The two per-source spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputSpaceRole {
    /// The pointing ray.
    TargetRay,
    /// Where the source is held.
    Grip,
}

/// An input source as reported by the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSource {
    /// Stable identifier.
    pub id: InputSourceId,
    /// Which hand holds it.
    pub handedness: Handedness,
    /// How its target ray is produced.
    pub target_ray_mode: TargetRayMode,
    /// Input profile names, most specific first.
    pub profiles: Vec<String>,
}

impl InputSource {
    /// Creates a source with no profiles.
    #[must_use]
    pub fn new(id: InputSourceId, handedness: Handedness, target_ray_mode: TargetRayMode) -> Self {
        Self {
            id,
            handedness,
            target_ray_mode,
            profiles: Vec::new(),
        }
    }

    /// Whether the source has a grip space.
    #[must_use]
    pub fn has_grip(&self) -> bool {
        self.target_ray_mode == TargetRayMode::TrackedPointer
    }
}

/// An input source a session is tracking, with the spaces it owns.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedInput {
    source: InputSource,
    target_ray_space: SpaceId,
    grip_space: Option<SpaceId>,
}

impl TrackedInput {
    /// The source as last reported.
    #[must_use]
    pub fn source(&self) -> &InputSource {
        &self.source
    }

    /// The source's target-ray space.
    #[must_use]
    pub fn target_ray_space(&self) -> SpaceId {
        self.target_ray_space
    }

    /// The source's grip space, for tracked pointers only.
    #[must_use]
    pub fn grip_space(&self) -> Option<SpaceId> {
        self.grip_space
    }
}

/// Sources that appeared or disappeared between two ticks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputSourcesChange {
    /// Newly reported sources.
    pub added: Vec<InputSource>,
    /// Sources no longer reported.
    pub removed: Vec<InputSource>,
}

/// A session's snapshot of the device's input sources.
#[derive(Clone, Debug, Default)]
pub struct InputSourceSet {
    tracked: Vec<TrackedInput>,
}

impl InputSourceSet {
    /// Returns the tracked sources in the order they were added.
    #[must_use]
    pub fn tracked(&self) -> &[TrackedInput] {
        &self.tracked
    }

    /// Returns the tracked entry for `id`.
    #[must_use]
    pub fn get(&self, id: InputSourceId) -> Option<&TrackedInput> {
        self.tracked.iter().find(|t| t.source.id == id)
    }

    /// Diffs `current` against the snapshot by source id.
    ///
    /// Removed sources have their spaces destroyed. Added sources get a
    /// target-ray space and, if they have one, a grip space. Returns `None`
    /// when nothing changed.
    pub fn sync(
        &mut self,
        current: &[InputSource],
        spaces: &mut SpaceStore,
    ) -> Option<InputSourcesChange> {
        let mut change = InputSourcesChange::default();

        let mut i = 0;
        while i < self.tracked.len() {
            if current.iter().any(|s| s.id == self.tracked[i].source.id) {
                i += 1;
                continue;
            }
            let gone = self.tracked.remove(i);
            spaces.destroy(gone.target_ray_space);
            if let Some(grip) = gone.grip_space {
                spaces.destroy(grip);
            }
            change.removed.push(gone.source);
        }

        for source in current {
            if self.get(source.id).is_some() {
                continue;
            }
            let target_ray_space = spaces.create(SpaceRole::TargetRay(source.id));
            let grip_space = source
                .has_grip()
                .then(|| spaces.create(SpaceRole::Grip(source.id)));
            self.tracked.push(TrackedInput {
                source: source.clone(),
                target_ray_space,
                grip_space,
            });
            change.added.push(source.clone());
        }

        (!change.added.is_empty() || !change.removed.is_empty()).then_some(change)
    }

    /// Destroys every tracked source's spaces and forgets the sources.
    pub(crate) fn clear(&mut self, spaces: &mut SpaceStore) {
        for gone in self.tracked.drain(..) {
            spaces.destroy(gone.target_ray_space);
            if let Some(grip) = gone.grip_space {
                spaces.destroy(grip);
            }
        }
    }
}

/// The primary action of an input source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputAction {
    /// Trigger, tap or pinch.
    Select,
    /// Grip squeeze.
    Squeeze,
}

/// Whether an action began or ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputPhase {
    /// The action began.
    Start,
    /// The action ended.
    End,
}

/// A select or squeeze transition as reported by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawInputEvent {
    /// Session the device addressed the event to.
    pub session: SessionId,
    /// Source that produced it.
    pub source: InputSourceId,
    /// Which action.
    pub action: InputAction,
    /// Start or end.
    pub phase: InputPhase,
}

/// The semantic events produced by one raw event.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutedInput {
    primary: SessionEvent,
    implied: Option<SessionEvent>,
}

impl RoutedInput {
    /// Iterates over the events in dispatch order.
    pub fn events(&self) -> impl Iterator<Item = &SessionEvent> {
        core::iter::once(&self.primary).chain(self.implied.as_ref())
    }
}

/// Maps raw input events addressed to one session onto session events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputRouter {
    session: SessionId,
}

impl InputRouter {
    /// Creates a router for `session`.
    #[must_use]
    pub const fn new(session: SessionId) -> Self {
        Self { session }
    }

    /// Returns the semantic events for `event`, or `None` if it is addressed
    /// to another session.
    #[must_use]
    pub fn route(&self, event: &RawInputEvent) -> Option<RoutedInput> {
        if event.session != self.session {
            return None;
        }
        let source = event.source;
        let (primary, implied) = match (event.action, event.phase) {
            (InputAction::Select, InputPhase::Start) => (SessionEvent::SelectStart { source }, None),
            (InputAction::Select, InputPhase::End) => (
                SessionEvent::SelectEnd { source },
                Some(SessionEvent::Select { source }),
            ),
            (InputAction::Squeeze, InputPhase::Start) => {
                (SessionEvent::SqueezeStart { source }, None)
            }
            (InputAction::Squeeze, InputPhase::End) => (
                SessionEvent::SqueezeEnd { source },
                Some(SessionEvent::Squeeze { source }),
            ),
        };
        Some(RoutedInput { primary, implied })
    }
}
