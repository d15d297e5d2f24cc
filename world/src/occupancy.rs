//! Movables and the sub-position allocator that spreads them inside a cell.

use std::time::Duration;

use highland_core::{CellCoord, Direction, Event, MovableId, MovableType, VisualHandle};
use tracing::debug;

use crate::World;

const FIRST_DENOMINATOR: f32 = 0.5;
const MAX_DENOMINATOR: f32 = 16.0;

#[derive(Clone, Debug)]
pub(crate) struct Movable {
    pub(crate) identity: MovableType,
    pub(crate) cell: CellCoord,
    pub(crate) pos_in_tile: f32,
    pub(crate) visual: VisualHandle,
    pub(crate) remaining: Option<Duration>,
}

impl World {
    /// Picks the first sub-position in `cell` not held by another occupant.
    ///
    /// Candidates are `numerator / denominator` with the denominator doubling
    /// from 0.5 up to 16, probing `0, 1, 0.5, 1.5, 0.25, 0.75, ...`. Once every
    /// candidate is taken the next probe, `1/32`, is returned even though it
    /// may collide.
    #[must_use]
    pub fn free_position_in_cell(&self, cell: CellCoord) -> f32 {
        let taken: Vec<f32> = self
            .index(cell)
            .map(|index| {
                self.occupants[index]
                    .iter()
                    .filter_map(|id| self.movables.get(id))
                    .map(|movable| movable.pos_in_tile)
                    .collect()
            })
            .unwrap_or_default();

        let mut numerator = 0.0_f32;
        let mut denominator = FIRST_DENOMINATOR;
        while denominator <= MAX_DENOMINATOR {
            while numerator < 2.0 * denominator {
                let candidate = numerator / denominator;
                if !taken.contains(&candidate) {
                    return candidate;
                }
                numerator += 2.0;
            }
            numerator = 1.0;
            denominator *= 2.0;
        }
        numerator / denominator
    }

    /// Creates a movable in `cell`, returning its identifier and sub-position.
    pub fn spawn_movable(
        &mut self,
        identity: MovableType,
        cell: CellCoord,
    ) -> Option<(MovableId, f32)> {
        let index = self.index(cell)?;
        let id = MovableId::new(self.next_movable);
        self.next_movable = self.next_movable.checked_add(1)?;

        let pos_in_tile = self.free_position_in_cell(cell);
        let visual = self.port.acquire_movable(&identity, cell, pos_in_tile);
        let _ = self.occupants[index].insert(id);
        let _ = self.movables.insert(
            id,
            Movable {
                identity,
                cell,
                pos_in_tile,
                visual,
                remaining: None,
            },
        );
        debug!(movable = id.get(), %cell, pos_in_tile, "spawned movable");
        Some((id, pos_in_tile))
    }

    /// Reports whether `movable` may step one cell in `direction`.
    ///
    /// The movable must be idle, its cell must allow leaving through that side
    /// and the destination must exist and allow entering from the opposite one.
    #[must_use]
    pub fn can_move(&self, movable: MovableId, direction: Direction) -> bool {
        self.destination(movable, direction).is_some()
    }

    /// Starts moving `movable` one cell in `direction`.
    ///
    /// Membership changes immediately; the render port interpolates the sprite
    /// over the configured transition time.
    pub fn move_movable(
        &mut self,
        movable: MovableId,
        direction: Direction,
    ) -> Option<(CellCoord, CellCoord, f32)> {
        let (from_index, to_index, to) = self.destination(movable, direction)?;
        let from = self.movables.get(&movable)?.cell;

        let _ = self.occupants[from_index].remove(&movable);
        let pos_in_tile = self.free_position_in_cell(to);
        let _ = self.occupants[to_index].insert(movable);

        let transition = self.transition;
        let entry = self.movables.get_mut(&movable)?;
        entry.cell = to;
        entry.pos_in_tile = pos_in_tile;
        entry.remaining = Some(transition);
        self.port
            .begin_transition(entry.visual, to, pos_in_tile, transition);
        debug!(movable = movable.get(), %from, %to, "movable started moving");
        Some((from, to, pos_in_tile))
    }

    pub(crate) fn advance_transitions(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        for (id, movable) in &mut self.movables {
            let Some(remaining) = movable.remaining else {
                continue;
            };
            let remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                movable.remaining = None;
                out_events.push(Event::MovableSettled { movable: *id });
            } else {
                movable.remaining = Some(remaining);
            }
        }
    }

    fn destination(
        &self,
        movable: MovableId,
        direction: Direction,
    ) -> Option<(usize, usize, CellCoord)> {
        let entry = self.movables.get(&movable)?;
        if entry.remaining.is_some() {
            return None;
        }
        let from_index = self.index(entry.cell)?;
        let default_radius = self.catalog.default_radius();
        if !self.tiles[from_index]
            .top_passable(default_radius)
            .allows(direction)
        {
            return None;
        }
        let to = entry.cell.step(direction)?;
        let to_index = self.index(to)?;
        if !self.tiles[to_index]
            .top_passable(default_radius)
            .allows(direction.opposite())
        {
            return None;
        }
        Some((from_index, to_index, to))
    }
}
