//! Saving the map to its persisted form and rebuilding it from one.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use highland_core::{
    CellCoord, CellEffects, EditRejection, Elevation, GroundEntryJson, MapJson, NullRenderPort,
    RenderPort, TileJson, CLIFF_KIND,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{catalog::CatalogError, EditError, GroundCatalog, Tile, World, WorldConfig};

/// Errors raised while rebuilding a map from a snapshot.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Snapshot rows do not all have the same length.
    #[error("snapshot rows have different lengths")]
    Ragged,
    /// Snapshot and map sizes differ.
    #[error("snapshot is {found_columns}x{found_rows} but the map is {columns}x{rows}")]
    DimensionMismatch {
        /// Columns of the map.
        columns: u32,
        /// Rows of the map.
        rows: u32,
        /// Columns of the snapshot.
        found_columns: u32,
        /// Rows of the snapshot.
        found_rows: u32,
    },
    /// A cell has no ground at all.
    #[error("cell {cell} has no ground")]
    EmptyCell {
        /// Offending cell.
        cell: CellCoord,
    },
    /// Entries of a cell are not in ascending elevation order.
    #[error("entries of cell {cell} are not sorted by elevation")]
    Unsorted {
        /// Offending cell.
        cell: CellCoord,
    },
    /// Replaying an entry was refused by the edit rules.
    #[error("replaying cell {cell} was rejected: {reason}")]
    Replay {
        /// Offending cell.
        cell: CellCoord,
        /// Rejection reported by the world.
        reason: EditRejection,
    },
    /// The rebuilt stack of a cell does not match the snapshot.
    #[error("cell {cell} did not rebuild to its saved stack")]
    Diverged {
        /// Offending cell.
        cell: CellCoord,
    },
    /// The snapshot names a ground the catalog does not define.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl World {
    /// Flattens every tile into the persisted form, row by row.
    #[must_use]
    pub fn save_to_json(&self) -> MapJson {
        let ground = (0..self.rows)
            .map(|row| {
                (0..self.columns)
                    .filter_map(|column| self.index(CellCoord::new(column, row)))
                    .map(|index| self.tiles[index].save_to_json())
                    .collect()
            })
            .collect();
        MapJson { ground }
    }

    /// Creates a world sized to the snapshot and loads it.
    pub fn from_json(
        map: &MapJson,
        config: WorldConfig,
        catalog: Arc<GroundCatalog>,
        port: Box<dyn RenderPort>,
    ) -> Result<Self, LoadError> {
        let (columns, rows) = map.dimensions().ok_or(LoadError::Ragged)?;
        let mut world = World::new(
            WorldConfig {
                columns,
                rows,
                ..config
            },
            catalog,
            port,
        )?;
        world.load_from_json(map)?;
        Ok(world)
    }

    /// Replaces the ground of every cell with the snapshot's.
    ///
    /// Each tile restarts from its saved bottom entry. The remaining entries
    /// are replayed band by band in ascending order: saved cliff fillers first,
    /// then the walkable entries through the regular add rules, after which any
    /// filler the snapshot does not have is dropped again. Saved variants are
    /// restored last so buried entries keep the edges they had. Movables are
    /// left untouched.
    ///
    /// The new stacks are built on the side and swapped in only once every
    /// cell rebuilt, so a failed load leaves the map as it was.
    pub fn load_from_json(&mut self, map: &MapJson) -> Result<(), LoadError> {
        let saved = self.validate_snapshot(map)?;
        let effects: Vec<CellEffects> = self
            .tiles
            .iter()
            .map(|tile| tile.effects().clone())
            .collect();

        let port = std::mem::replace(&mut self.port, Box::new(NullRenderPort::new()));
        let mut staged = World {
            columns: self.columns,
            rows: self.rows,
            tiles: Vec::with_capacity(saved.len()),
            occupants: Vec::new(),
            movables: BTreeMap::new(),
            next_movable: 0,
            transition: self.transition,
            catalog: Arc::clone(&self.catalog),
            port,
        };
        let rebuilt = staged.rebuild(&saved, effects);
        let mut tiles = std::mem::take(&mut staged.tiles);
        self.port = staged.port;

        match rebuilt {
            Ok(()) => {
                let previous = std::mem::replace(&mut self.tiles, tiles);
                for mut tile in previous {
                    tile.release_all(self.port.as_mut());
                }
                debug!(columns = self.columns, rows = self.rows, "loaded snapshot");
                Ok(())
            }
            Err(error) => {
                for tile in &mut tiles {
                    tile.release_all(self.port.as_mut());
                }
                Err(error)
            }
        }
    }

    /// Builds every tile of an empty staging world from the validated snapshot.
    fn rebuild(
        &mut self,
        saved: &[(CellCoord, &[GroundEntryJson])],
        effects: Vec<CellEffects>,
    ) -> Result<(), LoadError> {
        for ((cell, entries), effects) in saved.iter().zip(effects) {
            let base = &entries[0];
            let mut tile = Tile::new(
                *cell,
                base.ground(),
                base.elevation,
                &self.catalog,
                self.port.as_mut(),
            )?;
            let _ = tile.replace_effects(effects);
            self.tiles.push(tile);
        }

        let bands: BTreeSet<i32> = saved
            .iter()
            .flat_map(|(_, entries)| entries.iter().skip(1))
            .map(|entry| entry.elevation.band())
            .collect();
        for band in bands {
            self.replay_band(saved, Elevation::whole(band))?;
        }

        for (cell, entries) in saved {
            self.restore_saved_variants(*cell, entries)?;
        }
        for (cell, _) in saved {
            self.fix_effects(*cell);
        }
        Ok(())
    }

    fn validate_snapshot<'a>(
        &self,
        map: &'a MapJson,
    ) -> Result<Vec<(CellCoord, &'a [GroundEntryJson])>, LoadError> {
        let (found_columns, found_rows) = map.dimensions().ok_or(LoadError::Ragged)?;
        if (found_columns, found_rows) != (self.columns, self.rows) {
            return Err(LoadError::DimensionMismatch {
                columns: self.columns,
                rows: self.rows,
                found_columns,
                found_rows,
            });
        }

        let mut saved = Vec::with_capacity(self.tiles.len());
        for (row, tiles) in (0u32..).zip(&map.ground) {
            for (column, TileJson { zorder }) in (0u32..).zip(tiles) {
                let cell = CellCoord::new(column, row);
                if zorder.is_empty() {
                    return Err(LoadError::EmptyCell { cell });
                }
                if zorder
                    .windows(2)
                    .any(|pair| pair[0].elevation > pair[1].elevation)
                {
                    return Err(LoadError::Unsorted { cell });
                }
                for entry in zorder {
                    let _ = self.catalog.spec(&entry.kind, &entry.variant)?;
                }
                saved.push((cell, zorder.as_slice()));
            }
        }
        Ok(saved)
    }

    fn replay_band(
        &mut self,
        saved: &[(CellCoord, &[GroundEntryJson])],
        level: Elevation,
    ) -> Result<(), LoadError> {
        let cliff = level.cliff_below();

        for (index, (_, entries)) in saved.iter().enumerate() {
            for entry in entries.iter().skip(1).filter(|entry| entry.elevation == cliff) {
                self.tiles[index].push_ground_at_elevation(
                    entry.ground(),
                    cliff,
                    &self.catalog,
                    self.port.as_mut(),
                )?;
            }
        }

        for (index, (cell, entries)) in saved.iter().enumerate() {
            for entry in entries.iter().skip(1).filter(|entry| entry.elevation == level) {
                let ground = entry.ground();
                match self.try_add_tile(*cell, &ground, level) {
                    Ok(()) => {}
                    Err(EditError::Rejected(
                        reason @ (EditRejection::Unsupported | EditRejection::DuplicateKind),
                    )) => {
                        warn!(%cell, %ground, %level, %reason, "placing saved ground directly");
                        self.tiles[index].push_ground_at_elevation(
                            ground,
                            level,
                            &self.catalog,
                            self.port.as_mut(),
                        )?;
                    }
                    Err(EditError::Rejected(reason)) => {
                        return Err(LoadError::Replay {
                            cell: *cell,
                            reason,
                        })
                    }
                    Err(EditError::Catalog(error)) => return Err(error.into()),
                }
            }
        }

        for (index, (cell, entries)) in saved.iter().enumerate() {
            let expected = entries
                .iter()
                .filter(|entry| entry.elevation == cliff)
                .count();
            let mut dropped = false;
            while self.tiles[index].num_grounds_at_elevation(cliff) > expected {
                let Some(removed) = self.tiles[index]
                    .delete_ground_on_top_at_elevation(cliff, self.port.as_mut())
                else {
                    break;
                };
                warn!(%cell, ground = %removed, %cliff, "dropped filler missing from snapshot");
                dropped = true;
            }
            if dropped {
                self.fix_autotile(*cell, CLIFF_KIND, cliff)?;
            }
        }
        Ok(())
    }

    fn restore_saved_variants(
        &mut self,
        cell: CellCoord,
        entries: &[GroundEntryJson],
    ) -> Result<(), LoadError> {
        let index = self.index(cell).ok_or(LoadError::Diverged { cell })?;
        let tile = &self.tiles[index];
        let matches = tile.zorder().len() == entries.len()
            && tile
                .zorder()
                .iter()
                .zip(entries)
                .all(|(entry, saved)| {
                    entry.elevation() == saved.elevation && entry.ground().kind == saved.kind
                });
        if !matches {
            return Err(LoadError::Diverged { cell });
        }
        for (position, saved) in entries.iter().enumerate() {
            self.tiles[index].restore_variant(
                position,
                &saved.variant,
                &self.catalog,
                self.port.as_mut(),
            )?;
        }
        Ok(())
    }
}
