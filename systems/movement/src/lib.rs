#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure movement system that turns directional intents into movable steps.

use std::collections::BTreeSet;

use highland_core::{Command, Direction, Event, MovableId};
use tracing::trace;

/// Request to step a movable one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveIntent {
    /// Movable that should step.
    pub movable: MovableId,
    /// Direction of the step.
    pub direction: Direction,
}

impl MoveIntent {
    /// Creates a new intent.
    #[must_use]
    pub const fn new(movable: MovableId, direction: Direction) -> Self {
        Self { movable, direction }
    }
}

/// Pure system that reacts to world events and emits movement commands.
#[derive(Debug, Default)]
pub struct Movement {
    busy: BTreeSet<MovableId>,
}

impl Movement {
    /// Creates a system that knows of no moving movables.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: BTreeSet::new(),
        }
    }

    /// Reports whether a step was requested or started and has not settled yet.
    #[must_use]
    pub fn is_busy(&self, movable: MovableId) -> bool {
        self.busy.contains(&movable)
    }

    /// Consumes world events and intents to emit `MoveMovable` commands.
    ///
    /// The `can_move` closure should mirror the semantics of the world's
    /// `query::can_move` helper. At most one step per movable is emitted until
    /// the world reports it settled or rejected.
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        intents: &[MoveIntent],
        can_move: F,
        out: &mut Vec<Command>,
    ) where
        F: Fn(MovableId, Direction) -> bool,
    {
        for event in events {
            match event {
                Event::MovableMoved { movable, .. } => {
                    let _ = self.busy.insert(*movable);
                }
                Event::MovableSettled { movable } | Event::MoveRejected { movable, .. } => {
                    let _ = self.busy.remove(movable);
                }
                _ => {}
            }
        }

        for intent in intents {
            if self.busy.contains(&intent.movable) {
                continue;
            }
            if !can_move(intent.movable, intent.direction) {
                trace!(
                    movable = intent.movable.get(),
                    direction = %intent.direction,
                    "step blocked"
                );
                continue;
            }
            let _ = self.busy.insert(intent.movable);
            out.push(Command::MoveMovable {
                movable: intent.movable,
                direction: intent.direction,
            });
        }
    }
}
