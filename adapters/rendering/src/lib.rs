#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless rendering adapter for Highland maps.
//!
//! [`SceneRecorder`] implements the world's [`RenderPort`] by keeping a
//! [`Scene`] of sprite instances, cell overlays and occupant sprites in sync
//! with every acquire, relabel and release call. Backends present the scene
//! without ever touching the world.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    f32::consts::PI,
    io::Write,
    rc::Rc,
    time::Duration,
};

use anyhow::{Context, Result as AnyResult};
use glam::Vec2;
use highland_core::{CellCoord, CellEffects, MovableType, RenderPort, SpriteRef, VisualHandle};
use thiserror::Error;
use tracing::warn;

/// Describes the pixel geometry of a tile grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileGridPresentation {
    /// Number of columns contained in the grid.
    pub columns: u32,
    /// Number of rows contained in the grid.
    pub rows: u32,
    /// Side length of a single tile expressed in world units.
    pub tile_length: f32,
    /// Distance of occupant sub-positions from the tile centre.
    pub occupant_radius: f32,
}

impl TileGridPresentation {
    /// Creates a new tile grid descriptor.
    ///
    /// Returns an error when the tile length is not positive or the occupant
    /// radius would push occupants outside their tile.
    pub fn new(
        columns: u32,
        rows: u32,
        tile_length: f32,
        occupant_radius: f32,
    ) -> Result<Self, RenderingError> {
        if tile_length.is_nan() || tile_length <= 0.0 {
            return Err(RenderingError::InvalidTileLength { tile_length });
        }
        if !(0.0..=tile_length / 2.0).contains(&occupant_radius) {
            return Err(RenderingError::InvalidOccupantRadius {
                radius: occupant_radius,
                tile_length,
            });
        }
        Ok(Self {
            columns,
            rows,
            tile_length,
            occupant_radius,
        })
    }

    /// Calculates the total width of the grid.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.columns as f32 * self.tile_length
    }

    /// Calculates the total height of the grid.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.rows as f32 * self.tile_length
    }

    /// World-space centre of a cell.
    #[must_use]
    pub fn cell_center(&self, cell: CellCoord) -> Vec2 {
        Vec2::new(
            cell.column() as f32 * self.tile_length,
            cell.row() as f32 * self.tile_length,
        ) + Vec2::splat(self.tile_length / 2.0)
    }

    /// World-space position of an occupant at `pos_in_tile` within `cell`.
    ///
    /// The sub-position is an angle in units of π on a circle around the
    /// tile centre, so `0` sits below the centre and `1` above it.
    #[must_use]
    pub fn occupant_position(&self, cell: CellCoord, pos_in_tile: f32) -> Vec2 {
        let angle = pos_in_tile * PI;
        self.cell_center(cell) + self.occupant_radius * Vec2::new(angle.sin(), angle.cos())
    }

    /// Cell under a world-space position, `None` outside the grid.
    #[must_use]
    pub fn cell_at(&self, position: Vec2) -> Option<CellCoord> {
        if position.x < 0.0 || position.y < 0.0 {
            return None;
        }
        let column = (position.x / self.tile_length).floor();
        let row = (position.y / self.tile_length).floor();
        if column >= self.columns as f32 || row >= self.rows as f32 {
            return None;
        }
        Some(CellCoord::new(column as u32, row as u32))
    }
}

/// One ground visual placed in the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteInstance {
    /// Cell the ground belongs to.
    pub cell: CellCoord,
    /// Frame currently shown.
    pub sprite: SpriteRef,
    /// Draw order; higher values are drawn later.
    pub depth: f32,
    /// Top-left corner of the sprite in world space.
    pub position: Vec2,
}

/// Interpolation of an occupant between two positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    /// Position when the transition started.
    pub from: Vec2,
    /// Position the occupant ends at.
    pub to: Vec2,
    /// Total length of the transition.
    pub duration: Duration,
    /// Time already spent.
    pub elapsed: Duration,
}

impl Transition {
    /// Fraction of the transition completed, in `0.0..=1.0`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

/// One movable visual placed in the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupantSprite {
    /// Kind and variant of the movable.
    pub identity: MovableType,
    /// Cell the occupant is heading to or resting in.
    pub cell: CellCoord,
    /// Sub-position within the cell.
    pub pos_in_tile: f32,
    /// Current world-space position.
    pub position: Vec2,
    /// Running interpolation, if any.
    pub transition: Option<Transition>,
}

/// Everything a backend needs to draw one frame.
#[derive(Clone, Debug)]
pub struct Scene {
    grid: TileGridPresentation,
    sprites: BTreeMap<VisualHandle, SpriteInstance>,
    effects: BTreeMap<CellCoord, CellEffects>,
    occupants: BTreeMap<VisualHandle, OccupantSprite>,
}

impl Scene {
    /// Creates an empty scene for the provided grid.
    #[must_use]
    pub fn new(grid: TileGridPresentation) -> Self {
        Self {
            grid,
            sprites: BTreeMap::new(),
            effects: BTreeMap::new(),
            occupants: BTreeMap::new(),
        }
    }

    /// Geometry of the grid the scene is laid out on.
    #[must_use]
    pub const fn grid(&self) -> &TileGridPresentation {
        &self.grid
    }

    /// Number of live ground visuals.
    #[must_use]
    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    /// Ground visual owned by `handle`.
    #[must_use]
    pub fn sprite(&self, handle: VisualHandle) -> Option<&SpriteInstance> {
        self.sprites.get(&handle)
    }

    /// Ground visuals in draw order: by depth, then by creation.
    #[must_use]
    pub fn sprites_by_depth(&self) -> Vec<(VisualHandle, &SpriteInstance)> {
        let mut sprites: Vec<(VisualHandle, &SpriteInstance)> = self
            .sprites
            .iter()
            .map(|(handle, sprite)| (*handle, sprite))
            .collect();
        sprites.sort_by(|(left_handle, left), (right_handle, right)| {
            left.depth
                .total_cmp(&right.depth)
                .then(left_handle.cmp(right_handle))
        });
        sprites
    }

    /// Overlays active on `cell`, `None` when it has none.
    #[must_use]
    pub fn effects(&self, cell: CellCoord) -> Option<&CellEffects> {
        self.effects.get(&cell)
    }

    /// Cells with at least one active overlay.
    pub fn effect_cells(&self) -> impl Iterator<Item = (&CellCoord, &CellEffects)> {
        self.effects.iter()
    }

    /// Occupant visual owned by `handle`.
    #[must_use]
    pub fn occupant(&self, handle: VisualHandle) -> Option<&OccupantSprite> {
        self.occupants.get(&handle)
    }

    /// Every occupant visual in creation order.
    pub fn occupants(&self) -> impl Iterator<Item = (&VisualHandle, &OccupantSprite)> {
        self.occupants.iter()
    }

    /// Advances every running transition by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        for occupant in self.occupants.values_mut() {
            let Some(mut transition) = occupant.transition else {
                continue;
            };
            transition.elapsed = transition.elapsed.saturating_add(dt);
            let progress = transition.progress();
            if progress < 1.0 {
                occupant.position = transition.from.lerp(transition.to, progress);
                occupant.transition = Some(transition);
            } else {
                occupant.position = transition.to;
                occupant.transition = None;
            }
        }
    }
}

/// Render port that records every call into a shared [`Scene`].
#[derive(Debug)]
pub struct SceneRecorder {
    scene: Rc<RefCell<Scene>>,
    next_handle: u64,
}

impl SceneRecorder {
    /// Creates a recorder drawing into a fresh scene.
    #[must_use]
    pub fn new(grid: TileGridPresentation) -> Self {
        Self {
            scene: Rc::new(RefCell::new(Scene::new(grid))),
            next_handle: 0,
        }
    }

    /// Shared view of the recorded scene, valid after the recorder moves into a world.
    #[must_use]
    pub fn scene(&self) -> Rc<RefCell<Scene>> {
        Rc::clone(&self.scene)
    }

    fn allocate(&mut self) -> VisualHandle {
        let handle = VisualHandle::new(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        handle
    }
}

impl RenderPort for SceneRecorder {
    fn acquire_ground(&mut self, cell: CellCoord, sprite: &SpriteRef, depth: f32) -> VisualHandle {
        let handle = self.allocate();
        let mut scene = self.scene.borrow_mut();
        let position = scene.grid.cell_center(cell) - Vec2::splat(scene.grid.tile_length / 2.0);
        let _ = scene.sprites.insert(
            handle,
            SpriteInstance {
                cell,
                sprite: sprite.clone(),
                depth,
                position,
            },
        );
        handle
    }

    fn relabel_ground(&mut self, handle: VisualHandle, sprite: &SpriteRef) {
        match self.scene.borrow_mut().sprites.get_mut(&handle) {
            Some(instance) => instance.sprite = sprite.clone(),
            None => warn!(handle = handle.get(), "relabel of unknown ground visual"),
        }
    }

    fn release_ground(&mut self, handle: VisualHandle) {
        if self.scene.borrow_mut().sprites.remove(&handle).is_none() {
            warn!(handle = handle.get(), "release of unknown ground visual");
        }
    }

    fn update_effects(&mut self, cell: CellCoord, effects: &CellEffects) {
        let mut scene = self.scene.borrow_mut();
        if effects.is_empty() {
            let _ = scene.effects.remove(&cell);
        } else {
            let _ = scene.effects.insert(cell, effects.clone());
        }
    }

    fn acquire_movable(
        &mut self,
        identity: &MovableType,
        cell: CellCoord,
        pos_in_tile: f32,
    ) -> VisualHandle {
        let handle = self.allocate();
        let mut scene = self.scene.borrow_mut();
        let position = scene.grid.occupant_position(cell, pos_in_tile);
        let _ = scene.occupants.insert(
            handle,
            OccupantSprite {
                identity: identity.clone(),
                cell,
                pos_in_tile,
                position,
                transition: None,
            },
        );
        handle
    }

    fn begin_transition(
        &mut self,
        handle: VisualHandle,
        to: CellCoord,
        pos_in_tile: f32,
        duration: Duration,
    ) {
        let mut scene = self.scene.borrow_mut();
        let target = scene.grid.occupant_position(to, pos_in_tile);
        let Some(occupant) = scene.occupants.get_mut(&handle) else {
            warn!(handle = handle.get(), "transition of unknown occupant visual");
            return;
        };
        occupant.cell = to;
        occupant.pos_in_tile = pos_in_tile;
        if duration.is_zero() {
            occupant.position = target;
            occupant.transition = None;
        } else {
            occupant.transition = Some(Transition {
                from: occupant.position,
                to: target,
                duration,
                elapsed: Duration::ZERO,
            });
        }
    }
}

/// Rendering backend capable of presenting Highland scenes.
pub trait RenderingBackend {
    /// Presents one frame of the scene.
    fn present(&mut self, scene: &Scene) -> AnyResult<()>;
}

/// Backend that writes the draw list as text, one visual per line.
#[derive(Debug)]
pub struct TextBackend<W> {
    out: W,
}

impl<W: Write> TextBackend<W> {
    /// Creates a backend writing into `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recovers the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderingBackend for TextBackend<W> {
    fn present(&mut self, scene: &Scene) -> AnyResult<()> {
        for (handle, sprite) in scene.sprites_by_depth() {
            writeln!(
                self.out,
                "ground #{} {} depth {:.1} {}/{}",
                handle.get(),
                sprite.cell,
                sprite.depth,
                sprite.sprite.resource,
                sprite.sprite.frame
            )
            .context("failed to write ground visual")?;
        }
        for (cell, effects) in scene.effect_cells() {
            writeln!(
                self.out,
                "effects {cell} shadows {:?} cliff-foot {}",
                effects.shadows,
                effects.cliff_foot.as_deref().unwrap_or("-")
            )
            .context("failed to write cell effects")?;
        }
        for (handle, occupant) in scene.occupants() {
            writeln!(
                self.out,
                "movable #{} {}/{} {} at ({:.1}, {:.1})",
                handle.get(),
                occupant.identity.kind,
                occupant.identity.variant,
                occupant.cell,
                occupant.position.x,
                occupant.position.y
            )
            .context("failed to write occupant")?;
        }
        self.out.flush().context("failed to flush scene output")
    }
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum RenderingError {
    /// Tiles must have a positive side length.
    #[error("tile_length must be positive (received {tile_length})")]
    InvalidTileLength {
        /// Provided length that failed validation.
        tile_length: f32,
    },
    /// Occupants must stay within their tile.
    #[error("occupant radius {radius} does not fit a tile of length {tile_length}")]
    InvalidOccupantRadius {
        /// Provided radius that failed validation.
        radius: f32,
        /// Tile length the radius was checked against.
        tile_length: f32,
    },
}
