//! Cosmetic overlays derived from neighbouring elevations.

use highland_core::{CellCoord, CellEffects, Direction, ShadowFlags};

use crate::World;

impl World {
    /// Recomputes the overlays of `cell`, notifying the render port on change.
    pub fn fix_effects(&mut self, cell: CellCoord) {
        let Some(index) = self.index(cell) else {
            return;
        };
        let effects = self.derive_effects(cell, index);
        if self.tiles[index].replace_effects(effects.clone()) {
            self.port.update_effects(cell, &effects);
        }
    }

    /// Recomputes overlays on every cell whose view of `cell` may have changed.
    ///
    /// An edit can move the top of the cell and of the cell in front of it, so
    /// both of those and their southern, western and eastern neighbours are
    /// refreshed.
    pub(crate) fn fix_effects_around(&mut self, cell: CellCoord) {
        let front = cell.step(Direction::Down);
        let mut cells = vec![cell];
        cells.extend(front);
        for origin in [Some(cell), front].into_iter().flatten() {
            cells.extend(origin.step(Direction::Left));
            cells.extend(origin.step(Direction::Right));
        }
        cells.extend(front.and_then(|front| front.step(Direction::Down)));

        for cell in cells {
            self.fix_effects(cell);
        }
    }

    fn derive_effects(&self, cell: CellCoord, index: usize) -> CellEffects {
        let tile = &self.tiles[index];
        let top = tile.elevation_on_top();

        let mut shadows = ShadowFlags::empty();
        for (direction, flag) in [
            (Direction::Up, ShadowFlags::NORTH),
            (Direction::Left, ShadowFlags::WEST),
            (Direction::Right, ShadowFlags::EAST),
        ] {
            let higher = cell
                .step(direction)
                .and_then(|neighbour| self.index(neighbour))
                .is_some_and(|neighbour| self.tiles[neighbour].elevation_on_top() > top);
            if higher {
                shadows |= flag;
            }
        }

        let cliff_foot = if top.is_whole() {
            None
        } else {
            tile.zorder()
                .iter()
                .rev()
                .find(|entry| entry.elevation().is_whole() && entry.elevation() < top)
                .map(|entry| entry.ground().kind.clone())
        };

        CellEffects {
            shadows,
            cliff_foot,
        }
    }
}
