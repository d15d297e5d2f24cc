#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Block programs that walk a movable across the map one step at a time.
//!
//! A [`Program`] is a tree of [`Block`]s, either built directly, read from
//! JSON, or parsed from a compact text form such as `repeat 3 [ right down ]`.
//! A [`Script`] runs one program for one movable and hands out a single
//! [`MoveIntent`] whenever the previous step has finished.

use highland_core::{Direction, Event, MovableId};
use highland_system_movement::MoveIntent;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Largest number of steps a program may expand to.
pub const MAX_STEPS: u64 = 10_000;

/// One instruction of a block program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum Block {
    /// Steps one cell to the right.
    MoveRight,
    /// Steps one cell in the given direction.
    MoveDirection {
        /// Direction of the step.
        direction: Direction,
    },
    /// Runs the body a fixed number of times.
    RepeatN {
        /// Number of runs.
        times: u32,
        /// Blocks run on every pass.
        body: Vec<Block>,
    },
}

/// Reasons a program cannot be parsed or run.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProgramError {
    /// A word is not a known block.
    #[error("unknown block '{0}'")]
    UnknownBlock(String),
    /// `repeat` was not followed by a count.
    #[error("repeat needs a count")]
    MissingCount,
    /// The repeat count is not a non-negative integer.
    #[error("invalid repeat count '{0}'")]
    InvalidCount(String),
    /// The repeat count was not followed by `[`.
    #[error("repeat body must start with '['")]
    MissingBody,
    /// A repeat body was never closed.
    #[error("repeat body is missing its closing ']'")]
    UnclosedBody,
    /// A `]` appeared outside any repeat body.
    #[error("unexpected ']'")]
    UnexpectedClose,
    /// The program expands past [`MAX_STEPS`].
    #[error("program expands to more than {limit} steps")]
    TooLong {
        /// Step limit that was exceeded.
        limit: u64,
    },
}

/// Sequence of blocks run from top to bottom.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    blocks: Vec<Block>,
}

impl Program {
    /// Wraps an already built block list.
    #[must_use]
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Program that takes each step once, in order.
    #[must_use]
    pub fn from_steps(steps: impl IntoIterator<Item = Direction>) -> Self {
        Self::new(
            steps
                .into_iter()
                .map(|direction| Block::MoveDirection { direction })
                .collect(),
        )
    }

    /// Top level blocks of the program.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Parses the text form.
    ///
    /// Words are `up`, `down`, `left`, `right`, `move_right` and
    /// `repeat N [ ... ]`. Commas count as whitespace.
    pub fn parse(source: &str) -> Result<Self, ProgramError> {
        let spaced = source
            .replace('[', " [ ")
            .replace(']', " ] ")
            .replace(',', " ");
        let mut tokens = spaced.split_whitespace();
        let blocks = parse_blocks(&mut tokens, false)?;
        Ok(Self::new(blocks))
    }

    /// Flattens the program into the steps it takes.
    pub fn expand(&self) -> Result<Vec<Direction>, ProgramError> {
        let count = step_count(&self.blocks);
        if count > MAX_STEPS {
            return Err(ProgramError::TooLong { limit: MAX_STEPS });
        }
        let mut steps = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
        expand_into(&self.blocks, &mut steps);
        Ok(steps)
    }
}

fn parse_blocks<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    nested: bool,
) -> Result<Vec<Block>, ProgramError> {
    let mut blocks = Vec::new();
    loop {
        let Some(token) = tokens.next() else {
            return if nested {
                Err(ProgramError::UnclosedBody)
            } else {
                Ok(blocks)
            };
        };
        let block = match token {
            "]" if nested => return Ok(blocks),
            "]" => return Err(ProgramError::UnexpectedClose),
            "move_right" => Block::MoveRight,
            "repeat" => {
                let count = tokens.next().ok_or(ProgramError::MissingCount)?;
                let times = count
                    .parse::<u32>()
                    .map_err(|_| ProgramError::InvalidCount(count.to_owned()))?;
                if tokens.next() != Some("[") {
                    return Err(ProgramError::MissingBody);
                }
                let body = parse_blocks(tokens, true)?;
                Block::RepeatN { times, body }
            }
            word => {
                let direction = Direction::ALL
                    .into_iter()
                    .find(|direction| direction.as_str() == word)
                    .ok_or_else(|| ProgramError::UnknownBlock(word.to_owned()))?;
                Block::MoveDirection { direction }
            }
        };
        blocks.push(block);
    }
}

fn step_count(blocks: &[Block]) -> u64 {
    blocks.iter().fold(0u64, |total, block| {
        let steps = match block {
            Block::MoveRight | Block::MoveDirection { .. } => 1,
            Block::RepeatN { times, body } => u64::from(*times).saturating_mul(step_count(body)),
        };
        total.saturating_add(steps)
    })
}

fn expand_into(blocks: &[Block], steps: &mut Vec<Direction>) {
    for block in blocks {
        match block {
            Block::MoveRight => steps.push(Direction::Right),
            Block::MoveDirection { direction } => steps.push(*direction),
            Block::RepeatN { times, body } => {
                if step_count(body) == 0 {
                    continue;
                }
                for _ in 0..*times {
                    expand_into(body, steps);
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Progress {
    Idle,
    Issued,
    Moving,
}

/// Runs a program for one movable, one step at a time.
#[derive(Clone, Debug)]
pub struct Script {
    movable: MovableId,
    steps: Vec<Direction>,
    next: usize,
    progress: Progress,
}

impl Script {
    /// Prepares `program` to drive `movable`.
    pub fn new(program: &Program, movable: MovableId) -> Result<Self, ProgramError> {
        let steps = program.expand()?;
        debug!(movable = movable.get(), steps = steps.len(), "script loaded");
        Ok(Self {
            movable,
            steps,
            next: 0,
            progress: Progress::Idle,
        })
    }

    /// Movable the script drives.
    #[must_use]
    pub const fn movable(&self) -> MovableId {
        self.movable
    }

    /// Steps not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> &[Direction] {
        &self.steps[self.next..]
    }

    /// Reports whether every step was handed out and the last one is over.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.next == self.steps.len() && self.progress == Progress::Idle
    }

    /// Consumes world events and emits the next intent once the movable is free.
    ///
    /// A step that produced neither a move nor a rejection by the next call was
    /// dropped before reaching the world and counts as taken.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<MoveIntent>) {
        for event in events {
            match event {
                Event::MovableMoved { movable, .. } if *movable == self.movable => {
                    self.progress = Progress::Moving;
                }
                Event::MovableSettled { movable } | Event::MoveRejected { movable, .. }
                    if *movable == self.movable =>
                {
                    self.progress = Progress::Idle;
                }
                _ => {}
            }
        }
        if self.progress == Progress::Issued {
            trace!(movable = self.movable.get(), "step dropped before the world");
            self.progress = Progress::Idle;
        }

        if self.progress != Progress::Idle {
            return;
        }
        if let Some(direction) = self.steps.get(self.next).copied() {
            self.next += 1;
            self.progress = Progress::Issued;
            out.push(MoveIntent::new(self.movable, direction));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_bodies_nest() {
        let program = Program::parse("repeat 2 [ right repeat 2 [down] ], left").expect("valid");
        assert_eq!(
            program.blocks(),
            &[
                Block::RepeatN {
                    times: 2,
                    body: vec![
                        Block::MoveDirection {
                            direction: Direction::Right
                        },
                        Block::RepeatN {
                            times: 2,
                            body: vec![Block::MoveDirection {
                                direction: Direction::Down
                            }],
                        },
                    ],
                },
                Block::MoveDirection {
                    direction: Direction::Left
                },
            ]
        );
    }

    #[test]
    fn malformed_sources_are_rejected() {
        assert_eq!(
            Program::parse("jump"),
            Err(ProgramError::UnknownBlock("jump".to_owned()))
        );
        assert_eq!(Program::parse("repeat"), Err(ProgramError::MissingCount));
        assert_eq!(
            Program::parse("repeat -1 [ up ]"),
            Err(ProgramError::InvalidCount("-1".to_owned()))
        );
        assert_eq!(Program::parse("repeat 2 up"), Err(ProgramError::MissingBody));
        assert_eq!(Program::parse("repeat 2 [ up"), Err(ProgramError::UnclosedBody));
        assert_eq!(Program::parse("up ]"), Err(ProgramError::UnexpectedClose));
    }

    #[test]
    fn empty_sources_are_empty_programs() {
        let program = Program::parse("  ").expect("valid");
        assert!(program.blocks().is_empty());
        assert_eq!(program.expand(), Ok(Vec::new()));
    }

    #[test]
    fn huge_repeats_hit_the_step_limit() {
        let program = Program::parse("repeat 4000000000 [ repeat 4000000000 [ up ] ]")
            .expect("valid");
        assert_eq!(
            program.expand(),
            Err(ProgramError::TooLong { limit: MAX_STEPS })
        );

        let idle = Program::parse("repeat 4000000000 [ repeat 3 [ ] ] up").expect("valid");
        assert_eq!(idle.expand(), Ok(vec![Direction::Up]));
    }
}
