#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative map state for Highland.
//!
//! The [`World`] owns a grid of [`Tile`] stacks, the occupant sets of every
//! cell and the movables living on the map. All mutations go through the
//! orchestrating edit operations (or [`apply`]), which keep autotile edges,
//! cliff fillers and cosmetic effects consistent after every edit.

mod autotile;
mod catalog;
mod effects;
mod occupancy;
mod snapshot;
mod tile;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

use highland_core::{
    CellCoord, Command, Direction, EditRejection, Elevation, Event, GroundType, MovableId,
    RenderPort, CLIFF_KIND,
};
use thiserror::Error;
use tracing::debug;

pub use catalog::{CatalogError, GroundCatalog};
pub use snapshot::LoadError;
pub use tile::{render_depth, GroundEntry, KindPresence, Tile, WATER_KIND};

use occupancy::Movable;

const DEFAULT_COLUMNS: u32 = 16;
const DEFAULT_ROWS: u32 = 12;
const DEFAULT_TRANSITION: Duration = Duration::from_millis(250);

/// Errors produced by the `try_*` edit operations.
#[derive(Debug, Error)]
pub enum EditError {
    /// The edit was refused and nothing changed.
    #[error("edit rejected: {0}")]
    Rejected(#[from] EditRejection),
    /// The catalog lacks a ground the edit needed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Parameters used to create a [`World`].
#[derive(Clone, Debug, PartialEq)]
pub struct WorldConfig {
    /// Number of columns in the grid.
    pub columns: u32,
    /// Number of rows in the grid.
    pub rows: u32,
    /// Ground every cell starts with at the floor elevation.
    pub default_ground: GroundType,
    /// Time a movable spends travelling between two cells.
    pub transition: Duration,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            default_ground: GroundType::middle(WATER_KIND),
            transition: DEFAULT_TRANSITION,
        }
    }
}

/// Represents the authoritative Highland map state.
#[derive(Debug)]
pub struct World {
    columns: u32,
    rows: u32,
    tiles: Vec<Tile>,
    occupants: Vec<BTreeSet<MovableId>>,
    movables: BTreeMap<MovableId, Movable>,
    next_movable: u32,
    transition: Duration,
    catalog: Arc<GroundCatalog>,
    port: Box<dyn RenderPort>,
}

impl World {
    /// Creates a map where every cell holds the default ground at the floor elevation.
    pub fn new(
        config: WorldConfig,
        catalog: Arc<GroundCatalog>,
        mut port: Box<dyn RenderPort>,
    ) -> Result<Self, CatalogError> {
        let tiles = build_tiles(
            config.columns,
            config.rows,
            &config.default_ground,
            &catalog,
            port.as_mut(),
        )?;
        let cell_count = tiles.len();
        Ok(Self {
            columns: config.columns,
            rows: config.rows,
            tiles,
            occupants: vec![BTreeSet::new(); cell_count],
            movables: BTreeMap::new(),
            next_movable: 0,
            transition: config.transition,
            catalog,
            port,
        })
    }

    pub(crate) fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() >= self.columns || cell.row() >= self.rows {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let columns = usize::try_from(self.columns).ok()?;
        row.checked_mul(columns)?.checked_add(column)
    }

    fn top_at(&self, cell: Option<CellCoord>) -> Option<Elevation> {
        let index = self.index(cell?)?;
        Some(self.tiles[index].elevation_on_top())
    }

    /// Stacks `ground` on `cell` at `elevation`, returning whether the map changed.
    pub fn add_tile(
        &mut self,
        cell: CellCoord,
        ground: &GroundType,
        elevation: Elevation,
    ) -> Result<bool, CatalogError> {
        flatten(self.try_add_tile(cell, ground, elevation))
    }

    /// Stacks a ground and reports why the edit was refused.
    ///
    /// Above the floor, a rock filler is placed half a level below on this
    /// cell and on the cell in front of it whenever their top is lower, so the
    /// cliff face between both levels is drawn.
    pub fn try_add_tile(
        &mut self,
        cell: CellCoord,
        ground: &GroundType,
        elevation: Elevation,
    ) -> Result<(), EditError> {
        let index = self.index(cell).ok_or(EditRejection::OutOfBounds)?;
        if !elevation.is_whole() {
            return Err(EditRejection::CliffBand.into());
        }
        if elevation < Elevation::GROUND {
            return Err(EditRejection::ElevationOutOfRange.into());
        }
        if self.tiles[index]
            .ground_on_top_at_elevation(elevation)
            .is_some_and(|top| top.kind == ground.kind)
        {
            return Err(EditRejection::DuplicateKind.into());
        }

        let cliff = elevation.cliff_below();
        let front = cell.step(Direction::Down);
        let front_index = front.and_then(|front| self.index(front));
        let raised = elevation > Elevation::GROUND;
        if raised {
            let supported = front_index.is_some_and(|front| {
                self.tiles[front].num_grounds_at_elevation(elevation.level_below()) > 0
            });
            if !supported {
                return Err(EditRejection::Unsupported.into());
            }
        }

        let _ = self.catalog.spec_of(ground)?;
        let filler = GroundType::cliff_filler();
        let _ = self.catalog.spec_of(&filler)?;

        if raised {
            let mut filled = Vec::with_capacity(2);
            for target in [Some(index), front_index].into_iter().flatten() {
                if self.tiles[target].elevation_on_top() < cliff {
                    let _ = self.tiles[target].add_ground_on_top_at_elevation(
                        filler.clone(),
                        cliff,
                        &self.catalog,
                        self.port.as_mut(),
                    )?;
                    filled.push(self.tiles[target].cell());
                }
            }
            if !filled.is_empty() {
                debug!(?filled, %cliff, "inserted cliff fillers");
            }
        }

        let _ = self.tiles[index].add_ground_on_top_at_elevation(
            ground.clone(),
            elevation,
            &self.catalog,
            self.port.as_mut(),
        )?;

        self.fix_autotile(cell, &ground.kind, elevation)?;
        if raised {
            self.fix_autotile(cell, CLIFF_KIND, cliff)?;
            if let Some(front) = front {
                self.fix_autotile(front, CLIFF_KIND, cliff)?;
            }
        }
        self.fix_effects_around(cell);
        debug!(%cell, ground = %ground, %elevation, "added tile");
        Ok(())
    }

    /// Removes the top ground at `elevation` from `cell`, returning whether the map changed.
    pub fn delete_tile(
        &mut self,
        cell: CellCoord,
        elevation: Elevation,
    ) -> Result<bool, CatalogError> {
        flatten(self.try_delete_tile(cell, elevation))
    }

    /// Removes a ground and reports why the edit was refused.
    ///
    /// The last walkable entry of a cell is never removed, so a cell cannot be
    /// left holding only cliff fillers.
    ///
    /// A rock filler half a level below stays on a cell while that cell or the
    /// cell behind it still reaches the level above the filler. The check runs
    /// on this cell and walks down the column for as long as fillers keep
    /// disappearing, since every removal lowers the cell the next one leans on.
    pub fn try_delete_tile(
        &mut self,
        cell: CellCoord,
        elevation: Elevation,
    ) -> Result<(), EditError> {
        let index = self.index(cell).ok_or(EditRejection::OutOfBounds)?;
        if !elevation.is_whole() {
            return Err(EditRejection::CliffBand.into());
        }
        let tile = &self.tiles[index];
        let walkable = tile
            .zorder()
            .iter()
            .filter(|entry| entry.elevation().is_whole())
            .count();
        if walkable <= 1 {
            return Err(EditRejection::LastEntry.into());
        }
        if tile.num_grounds_at_elevation(elevation) == 0 {
            return Err(EditRejection::MissingEntry.into());
        }

        let Some(removed) =
            self.tiles[index].delete_ground_on_top_at_elevation(elevation, self.port.as_mut())
        else {
            return Err(EditRejection::MissingEntry.into());
        };

        let cliff = elevation.cliff_below();
        let front = cell.step(Direction::Down);
        self.fix_autotile(cell, &removed.kind, elevation)?;
        self.prune_fillers(cell)?;
        self.fix_autotile(cell, CLIFF_KIND, cliff)?;
        if let Some(front) = front {
            self.fix_autotile(front, CLIFF_KIND, cliff)?;
        }
        self.fix_effects_around(cell);
        debug!(%cell, ground = %removed, %elevation, "deleted tile");
        Ok(())
    }

    fn prune_fillers(&mut self, cell: CellCoord) -> Result<(), CatalogError> {
        let mut cursor = Some(cell);
        let mut visited = 0;
        while let Some(current) = cursor {
            let Some(index) = self.index(current) else {
                break;
            };
            let pruned = self.prune_fillers_at(current, index)?;
            visited += 1;
            if !pruned && visited >= 2 {
                break;
            }
            cursor = current.step(Direction::Down);
        }
        Ok(())
    }

    fn prune_fillers_at(&mut self, cell: CellCoord, index: usize) -> Result<bool, CatalogError> {
        let behind = self.top_at(cell.step(Direction::Up));
        let mut pruned = false;
        loop {
            let tile = &self.tiles[index];
            if tile.zorder().len() <= 1 {
                break;
            }
            let top = tile.elevation_on_top();
            let orphan = tile
                .zorder()
                .iter()
                .rev()
                .map(GroundEntry::elevation)
                .filter(|elevation| !elevation.is_whole())
                .find(|filler| {
                    let level = filler.half_above();
                    top < level && behind.map_or(true, |behind| behind < level)
                });
            let Some(filler) = orphan else {
                break;
            };

            let _ = self.tiles[index].delete_ground_on_top_at_elevation(filler, self.port.as_mut());
            debug!(%cell, %filler, "removed cliff filler");
            self.fix_autotile(cell, CLIFF_KIND, filler)?;
            pruned = true;
        }
        if pruned {
            self.fix_effects_around(cell);
        }
        Ok(pruned)
    }
}

fn build_tiles(
    columns: u32,
    rows: u32,
    ground: &GroundType,
    catalog: &GroundCatalog,
    port: &mut dyn RenderPort,
) -> Result<Vec<Tile>, CatalogError> {
    let mut tiles = Vec::new();
    for row in 0..rows {
        for column in 0..columns {
            tiles.push(Tile::new(
                CellCoord::new(column, row),
                ground.clone(),
                Elevation::GROUND,
                catalog,
                port,
            )?);
        }
    }
    Ok(tiles)
}

fn flatten(result: Result<(), EditError>) -> Result<bool, CatalogError> {
    match result {
        Ok(()) => Ok(true),
        Err(EditError::Rejected(_)) => Ok(false),
        Err(EditError::Catalog(error)) => Err(error),
    }
}

/// Applies the provided command to the world, broadcasting the outcome.
///
/// Rejected edits and moves are reported as events; only catalog
/// misconfiguration is returned as an error.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), CatalogError> {
    match command {
        Command::AddTile {
            cell,
            ground,
            elevation,
        } => match world.try_add_tile(cell, &ground, elevation) {
            Ok(()) => out_events.push(Event::TileAdded {
                cell,
                ground,
                elevation,
            }),
            Err(EditError::Rejected(reason)) => {
                out_events.push(Event::EditRejected { cell, reason });
            }
            Err(EditError::Catalog(error)) => return Err(error),
        },
        Command::DeleteTile { cell, elevation } => match world.try_delete_tile(cell, elevation) {
            Ok(()) => out_events.push(Event::TileDeleted { cell, elevation }),
            Err(EditError::Rejected(reason)) => {
                out_events.push(Event::EditRejected { cell, reason });
            }
            Err(EditError::Catalog(error)) => return Err(error),
        },
        Command::SetTile { cell, ground } => match world.try_set_tile(cell, &ground) {
            Ok(()) => out_events.push(Event::TileSet { cell, ground }),
            Err(EditError::Rejected(reason)) => {
                out_events.push(Event::EditRejected { cell, reason });
            }
            Err(EditError::Catalog(error)) => return Err(error),
        },
        Command::SpawnMovable { identity, cell } => {
            if let Some((movable, pos_in_tile)) = world.spawn_movable(identity, cell) {
                out_events.push(Event::MovableSpawned {
                    movable,
                    cell,
                    pos_in_tile,
                });
            }
        }
        Command::MoveMovable { movable, direction } => {
            match world.move_movable(movable, direction) {
                Some((from, to, pos_in_tile)) => out_events.push(Event::MovableMoved {
                    movable,
                    from,
                    to,
                    pos_in_tile,
                }),
                None => out_events.push(Event::MoveRejected { movable, direction }),
            }
        }
        Command::Tick { dt } => {
            out_events.push(Event::TimeAdvanced { dt });
            world.advance_transitions(dt, out_events);
        }
    }
    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use highland_core::{CellCoord, CellEffects, Direction, MovableId, MovableType, TopPassable};

    use super::{GroundCatalog, Tile, World};

    /// Dimensions of the grid as `(columns, rows)`.
    #[must_use]
    pub fn dimensions(world: &World) -> (u32, u32) {
        (world.columns, world.rows)
    }

    /// Tile stored at `cell`, if inside the grid.
    #[must_use]
    pub fn tile(world: &World, cell: CellCoord) -> Option<&Tile> {
        world.index(cell).map(|index| &world.tiles[index])
    }

    /// Every tile in row-major order.
    pub fn tiles(world: &World) -> impl Iterator<Item = &Tile> {
        world.tiles.iter()
    }

    /// Overlays currently shown on `cell`.
    #[must_use]
    pub fn effects(world: &World, cell: CellCoord) -> Option<&CellEffects> {
        tile(world, cell).map(Tile::effects)
    }

    /// Combined passability of `cell`.
    #[must_use]
    pub fn top_passable(world: &World, cell: CellCoord) -> Option<TopPassable> {
        tile(world, cell).map(|tile| tile.top_passable(world.catalog.default_radius()))
    }

    /// Catalog the world resolves grounds with.
    #[must_use]
    pub fn catalog(world: &World) -> &GroundCatalog {
        &world.catalog
    }

    /// Time a move transition lasts.
    #[must_use]
    pub fn transition(world: &World) -> Duration {
        world.transition
    }

    /// Movables registered in `cell`, in identifier order.
    #[must_use]
    pub fn occupants(world: &World, cell: CellCoord) -> Vec<MovableId> {
        world
            .index(cell)
            .map(|index| world.occupants[index].iter().copied().collect())
            .unwrap_or_default()
    }

    /// Reports whether `movable` may step in `direction` right now.
    #[must_use]
    pub fn can_move(world: &World, movable: MovableId, direction: Direction) -> bool {
        world.can_move(movable, direction)
    }

    /// Captures a read-only view of every movable.
    #[must_use]
    pub fn movable_view(world: &World) -> Vec<MovableSnapshot> {
        world
            .movables
            .iter()
            .map(|(id, movable)| MovableSnapshot {
                id: *id,
                identity: movable.identity.clone(),
                cell: movable.cell,
                pos_in_tile: movable.pos_in_tile,
                moving: movable.remaining.is_some(),
            })
            .collect()
    }

    /// Immutable representation of a single movable.
    #[derive(Clone, Debug, PartialEq)]
    pub struct MovableSnapshot {
        /// Identifier of the movable.
        pub id: MovableId,
        /// Kind and variant of the movable.
        pub identity: MovableType,
        /// Cell the movable is registered in.
        pub cell: CellCoord,
        /// Sub-position inside the cell.
        pub pos_in_tile: f32,
        /// Whether a transition is still running.
        pub moving: bool,
    }
}
