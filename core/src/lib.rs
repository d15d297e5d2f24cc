#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Highland map engine.
//!
//! This crate defines the vocabulary that connects the editor, the
//! authoritative world, and the rendering adapters. Editors submit [`Command`]
//! values describing desired map mutations, the world executes those commands
//! through its `apply` entry point and broadcasts [`Event`] values in return.
//! Visual resources are never owned by the world directly: it drives an
//! injected [`RenderPort`] and only ever holds opaque [`VisualHandle`]s.

use std::{fmt, time::Duration};

use bitflags::bitflags;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Ground kind selected in the editor to request deletion instead of painting.
pub const ERASE_KIND: &str = "erase";

/// Ground kind synthesised as the cliff face between two elevation bands.
pub const CLIFF_KIND: &str = "rock";

/// Edge descriptor used when no edge of a tile is exposed.
pub const MIDDLE: &str = "middle";

/// Prefix marking an edge descriptor that sits on an exposed cliff face.
pub const CLIFF_PREFIX: &str = "cliff-";

/// Identity of a ground layer: a catalog family and one of its variants.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroundType {
    /// Catalog family such as `grass`, `water` or `rock`.
    pub kind: String,
    /// Variant within the family, usually an edge descriptor.
    #[serde(rename = "type")]
    pub variant: String,
}

impl GroundType {
    /// Creates a ground type from its kind and variant.
    #[must_use]
    pub fn new(kind: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            variant: variant.into(),
        }
    }

    /// Creates the `middle` variant of the provided kind.
    #[must_use]
    pub fn middle(kind: impl Into<String>) -> Self {
        Self::new(kind, MIDDLE)
    }

    /// Synthetic filler inserted between two elevation bands.
    #[must_use]
    pub fn cliff_filler() -> Self {
        Self::middle(CLIFF_KIND)
    }

    /// Reports whether this ground is the editor's erase sentinel.
    #[must_use]
    pub fn is_erase(&self) -> bool {
        self.kind == ERASE_KIND
    }

    /// Reports whether this ground belongs to the cliff family.
    #[must_use]
    pub fn is_cliff_kind(&self) -> bool {
        self.kind == CLIFF_KIND
    }
}

impl fmt::Display for GroundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.variant)
    }
}

/// Height of a ground entry, stored exactly in half steps.
///
/// Whole values are walkable surfaces. A value ending in `.5` is the cliff band
/// directly below the next whole elevation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Elevation(i32);

impl Elevation {
    /// Floor elevation on which every map starts.
    pub const GROUND: Self = Self::whole(1);

    /// Creates a whole (walkable) elevation.
    #[must_use]
    pub const fn whole(level: i32) -> Self {
        Self(level * 2)
    }

    /// Creates an elevation from its half-step count.
    #[must_use]
    pub const fn from_half_steps(half_steps: i32) -> Self {
        Self(half_steps)
    }

    /// Highest level a map may hold. Its negation is the lowest.
    pub const MAX_LEVEL: i32 = 1 << 20;

    /// Converts a floating point elevation, rejecting values off the half grid
    /// or beyond [`Elevation::MAX_LEVEL`] levels from zero.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        let doubled = value * 2.0;
        if !doubled.is_finite() || doubled.fract() != 0.0 {
            return None;
        }
        let limit = f64::from(Self::MAX_LEVEL) * 2.0;
        if doubled < -limit || doubled > limit {
            return None;
        }
        Some(Self(doubled as i32))
    }

    /// Number of half steps above zero.
    #[must_use]
    pub const fn half_steps(self) -> i32 {
        self.0
    }

    /// Reports whether the elevation is a walkable surface.
    #[must_use]
    pub const fn is_whole(self) -> bool {
        self.0 % 2 == 0
    }

    /// Cliff band directly below this elevation.
    #[must_use]
    pub const fn cliff_below(self) -> Self {
        Self(self.0 - 1)
    }

    /// Elevation half a step up, the surface a cliff band belongs to.
    #[must_use]
    pub const fn half_above(self) -> Self {
        Self(self.0 + 1)
    }

    /// Whole elevation one level below this one.
    #[must_use]
    pub const fn level_below(self) -> Self {
        Self(self.0 - 2)
    }

    /// Integer band the elevation belongs to, rounding cliff bands up.
    ///
    /// A cliff at `1.5` and a surface at `2` share band `2`.
    #[must_use]
    pub const fn band(self) -> i32 {
        (self.0 + 1).div_euclid(2)
    }

    /// Elevation as a float, suitable for render depth.
    #[must_use]
    pub fn as_f32(self) -> f32 {
        self.0 as f32 / 2.0
    }

    /// Elevation as a double precision float.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 2.0
    }
}

impl fmt::Display for Elevation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{}", self.0 / 2)
        } else {
            write!(f, "{}", self.as_f64())
        }
    }
}

impl Serialize for Elevation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.is_whole() {
            serializer.serialize_i64(i64::from(self.0 / 2))
        } else {
            serializer.serialize_f64(self.as_f64())
        }
    }
}

impl<'de> Deserialize<'de> for Elevation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Self::from_f64(value).ok_or_else(|| {
            D::Error::custom(format!(
                "elevation {value} is not a multiple of 0.5 within ±{}",
                Self::MAX_LEVEL
            ))
        })
    }
}

/// Cardinal directions on the grid, named the way edge descriptors spell them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards decreasing row indices.
    Up,
    /// Towards increasing row indices.
    Down,
    /// Towards decreasing column indices.
    Left,
    /// Towards increasing column indices.
    Right,
}

impl Direction {
    /// Every direction in descriptor order.
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Edge flag describing this side of a tile.
    #[must_use]
    pub const fn edge(self) -> EdgeSet {
        match self {
            Self::Up => EdgeSet::UP,
            Self::Down => EdgeSet::DOWN,
            Self::Left => EdgeSet::LEFT,
            Self::Right => EdgeSet::RIGHT,
        }
    }

    /// Lowercase name used inside edge descriptors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Adjacent cell in the provided direction, unbounded on the far sides.
    ///
    /// Returns `None` only when stepping below zero; callers check the upper
    /// grid bounds themselves.
    #[must_use]
    pub fn step(self, direction: Direction) -> Option<CellCoord> {
        let (column, row) = match direction {
            Direction::Up => (Some(self.column), self.row.checked_sub(1)),
            Direction::Down => (Some(self.column), self.row.checked_add(1)),
            Direction::Left => (self.column.checked_sub(1), Some(self.row)),
            Direction::Right => (self.column.checked_add(1), Some(self.row)),
        };
        Some(CellCoord::new(column?, row?))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

bitflags! {
    /// Sides of a tile that face a different ground.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EdgeSet: u8 {
        /// Exposed top edge.
        const UP = 1 << 0;
        /// Exposed bottom edge.
        const DOWN = 1 << 1;
        /// Exposed left edge.
        const LEFT = 1 << 2;
        /// Exposed right edge.
        const RIGHT = 1 << 3;
    }
}

/// Decoded form of an autotile type string such as `cliff-up-left`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct EdgeDescriptor {
    /// Whether the descriptor carries the `cliff-` prefix.
    pub cliff: bool,
    /// Exposed sides.
    pub edges: EdgeSet,
}

impl EdgeDescriptor {
    /// Creates a descriptor from its parts.
    #[must_use]
    pub const fn new(cliff: bool, edges: EdgeSet) -> Self {
        Self { cliff, edges }
    }

    /// Reads the sides and cliff prefix out of a type string.
    ///
    /// Sides are detected by substring, so unknown decorations are ignored.
    #[must_use]
    pub fn parse(variant: &str) -> Self {
        let cliff = variant.starts_with(CLIFF_PREFIX);
        let edges = Direction::ALL
            .into_iter()
            .filter(|direction| variant.contains(direction.as_str()))
            .fold(EdgeSet::empty(), |edges, direction| edges | direction.edge());
        Self { cliff, edges }
    }

    /// Joins the sides in up, down, left, right order, `middle` when empty.
    #[must_use]
    pub fn to_variant(self) -> String {
        let sides: Vec<&str> = Direction::ALL
            .into_iter()
            .filter(|direction| self.edges.contains(direction.edge()))
            .map(Direction::as_str)
            .collect();
        let body = if sides.is_empty() {
            MIDDLE.to_owned()
        } else {
            sides.join("-")
        };
        if self.cliff {
            format!("{CLIFF_PREFIX}{body}")
        } else {
            body
        }
    }

    /// Every edge combination without the cliff prefix, `middle` first.
    pub fn all_plain() -> impl Iterator<Item = EdgeDescriptor> {
        (0u8..16).map(|bits| Self::new(false, EdgeSet::from_bits_truncate(bits)))
    }

    /// Every edge combination carrying the cliff prefix.
    pub fn all_cliff() -> impl Iterator<Item = EdgeDescriptor> {
        (0u8..16).map(|bits| Self::new(true, EdgeSet::from_bits_truncate(bits)))
    }
}

/// Per-side passability declared by a ground spec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Passable {
    /// Whether the top side may be crossed.
    #[serde(default)]
    pub up: bool,
    /// Whether the bottom side may be crossed.
    #[serde(default)]
    pub down: bool,
    /// Whether the left side may be crossed.
    #[serde(default)]
    pub left: bool,
    /// Whether the right side may be crossed.
    #[serde(default)]
    pub right: bool,
    /// Optional placement radius overriding the catalog default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
}

impl Passable {
    /// Passable on every side with no radius override.
    #[must_use]
    pub const fn open() -> Self {
        Self {
            up: true,
            down: true,
            left: true,
            right: true,
            radius: None,
        }
    }

    /// Reports whether the side facing `direction` may be crossed.
    #[must_use]
    pub const fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }
}

/// Passability of a whole cell combined across its ground stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TopPassable {
    /// Whether the top side may be crossed.
    pub up: bool,
    /// Whether the bottom side may be crossed.
    pub down: bool,
    /// Whether the left side may be crossed.
    pub left: bool,
    /// Whether the right side may be crossed.
    pub right: bool,
    /// Spacing radius used when placing occupants.
    pub radius: f32,
}

impl TopPassable {
    /// Reports whether the side facing `direction` may be crossed.
    #[must_use]
    pub const fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }
}

/// Sprite sheet and frame a ground variant is drawn with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteRef {
    /// Sprite sheet identifier.
    pub resource: String,
    /// Frame within the sheet.
    pub frame: String,
}

impl SpriteRef {
    /// Creates a new sprite reference.
    #[must_use]
    pub fn new(resource: impl Into<String>, frame: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            frame: frame.into(),
        }
    }
}

/// Appearance and physical properties of one catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundSpec {
    /// Per-side passability and optional radius.
    #[serde(default)]
    pub passable: Passable,
    /// Sprite used to draw the ground.
    pub sprite: SpriteRef,
}

bitflags! {
    /// Directions from which a higher neighbour casts a shadow onto a cell.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ShadowFlags: u8 {
        /// The cell above (`y - 1`) stands higher.
        const NORTH = 1 << 0;
        /// The cell to the left stands higher.
        const WEST = 1 << 1;
        /// The cell to the right stands higher.
        const EAST = 1 << 2;
    }
}

/// Cosmetic overlays derived from the elevations around a cell.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellEffects {
    /// Drop shadows cast by higher neighbours.
    pub shadows: ShadowFlags,
    /// Walkable kind at the foot of an exposed cliff face, if any.
    pub cliff_foot: Option<String>,
}

impl CellEffects {
    /// Reports whether no overlay is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shadows.is_empty() && self.cliff_foot.is_none()
    }
}

/// Opaque token for a visual resource owned by the rendering layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualHandle(u64);

impl VisualHandle {
    /// Creates a handle from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Unique identifier assigned to a movable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MovableId(u32);

impl MovableId {
    /// Creates a new movable identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identity of a movable: a family and one of its variants.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovableType {
    /// Family such as `knight`.
    pub kind: String,
    /// Variant within the family.
    #[serde(rename = "type")]
    pub variant: String,
}

impl MovableType {
    /// Creates a movable identity from its kind and variant.
    #[must_use]
    pub fn new(kind: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            variant: variant.into(),
        }
    }
}

/// Capability through which the world drives the display engine.
///
/// Every ground entry and every movable owns exactly one handle for its whole
/// lifetime. The world never inspects handles; it only acquires, relabels and
/// releases them.
pub trait RenderPort: fmt::Debug {
    /// Creates the visual for a new ground entry.
    fn acquire_ground(&mut self, cell: CellCoord, sprite: &SpriteRef, depth: f32) -> VisualHandle;

    /// Switches an existing ground visual to another sprite frame.
    fn relabel_ground(&mut self, handle: VisualHandle, sprite: &SpriteRef);

    /// Destroys a ground visual.
    fn release_ground(&mut self, handle: VisualHandle);

    /// Replaces the cosmetic overlays drawn on a cell.
    fn update_effects(&mut self, cell: CellCoord, effects: &CellEffects);

    /// Creates the visual for a newly spawned movable.
    fn acquire_movable(
        &mut self,
        identity: &MovableType,
        cell: CellCoord,
        pos_in_tile: f32,
    ) -> VisualHandle;

    /// Starts interpolating a movable towards a new cell, replacing any running transition.
    fn begin_transition(
        &mut self,
        handle: VisualHandle,
        to: CellCoord,
        pos_in_tile: f32,
        duration: Duration,
    );
}

/// Render port that draws nothing and hands out sequential handles.
#[derive(Clone, Debug, Default)]
pub struct NullRenderPort {
    next_handle: u64,
    live_grounds: usize,
}

impl NullRenderPort {
    /// Creates a new headless port.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_handle: 0,
            live_grounds: 0,
        }
    }

    /// Number of ground visuals acquired and not yet released.
    #[must_use]
    pub const fn live_grounds(&self) -> usize {
        self.live_grounds
    }

    fn allocate(&mut self) -> VisualHandle {
        let handle = VisualHandle::new(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        handle
    }
}

impl RenderPort for NullRenderPort {
    fn acquire_ground(
        &mut self,
        _cell: CellCoord,
        _sprite: &SpriteRef,
        _depth: f32,
    ) -> VisualHandle {
        self.live_grounds = self.live_grounds.saturating_add(1);
        self.allocate()
    }

    fn relabel_ground(&mut self, _handle: VisualHandle, _sprite: &SpriteRef) {}

    fn release_ground(&mut self, _handle: VisualHandle) {
        self.live_grounds = self.live_grounds.saturating_sub(1);
    }

    fn update_effects(&mut self, _cell: CellCoord, _effects: &CellEffects) {}

    fn acquire_movable(
        &mut self,
        _identity: &MovableType,
        _cell: CellCoord,
        _pos_in_tile: f32,
    ) -> VisualHandle {
        self.allocate()
    }

    fn begin_transition(
        &mut self,
        _handle: VisualHandle,
        _to: CellCoord,
        _pos_in_tile: f32,
        _duration: Duration,
    ) {
    }
}

/// Reasons a tile edit may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum EditRejection {
    /// The cell lies outside the grid.
    #[error("cell lies outside the grid")]
    OutOfBounds,
    /// The elevation band already shows this kind on top.
    #[error("the elevation band already shows this kind on top")]
    DuplicateKind,
    /// The cell in front (`y + 1`) has nothing one level below.
    #[error("the cell in front has no ground one level below")]
    Unsupported,
    /// Cliff bands are managed automatically and cannot be edited directly.
    #[error("cliff bands cannot be edited directly")]
    CliffBand,
    /// The elevation lies below the ground floor.
    #[error("elevation lies below the ground floor")]
    ElevationOutOfRange,
    /// The cell would be left without any ground.
    #[error("the last ground of a cell cannot be deleted")]
    LastEntry,
    /// No ground exists at the requested elevation.
    #[error("no ground exists at that elevation")]
    MissingEntry,
    /// Single-layer painting requires a cell without raised ground.
    #[error("single-layer painting requires a flat cell")]
    NotFlat,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Stacks a ground on a cell at the provided elevation.
    AddTile {
        /// Target cell.
        cell: CellCoord,
        /// Ground to insert.
        ground: GroundType,
        /// Whole elevation of the new entry.
        elevation: Elevation,
    },
    /// Removes the topmost ground at the provided elevation.
    DeleteTile {
        /// Target cell.
        cell: CellCoord,
        /// Whole elevation to delete from.
        elevation: Elevation,
    },
    /// Replaces the floor ground of a flat cell.
    SetTile {
        /// Target cell.
        cell: CellCoord,
        /// Ground to paint.
        ground: GroundType,
    },
    /// Creates a movable in the provided cell.
    SpawnMovable {
        /// Identity of the new movable.
        identity: MovableType,
        /// Starting cell.
        cell: CellCoord,
    },
    /// Requests that a movable step one cell in the provided direction.
    MoveMovable {
        /// Identifier of the movable.
        movable: MovableId,
        /// Direction of travel.
        direction: Direction,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a ground was stacked on a cell.
    TileAdded {
        /// Edited cell.
        cell: CellCoord,
        /// Ground that was requested.
        ground: GroundType,
        /// Elevation of the new entry.
        elevation: Elevation,
    },
    /// Confirms that a ground was removed from a cell.
    TileDeleted {
        /// Edited cell.
        cell: CellCoord,
        /// Elevation the ground was removed from.
        elevation: Elevation,
    },
    /// Confirms that the floor of a flat cell was repainted.
    TileSet {
        /// Edited cell.
        cell: CellCoord,
        /// Ground that was painted.
        ground: GroundType,
    },
    /// Reports that an edit was rejected without mutating the map.
    EditRejected {
        /// Cell targeted by the edit.
        cell: CellCoord,
        /// Specific reason the edit failed.
        reason: EditRejection,
    },
    /// Confirms that a movable was created.
    MovableSpawned {
        /// Identifier assigned to the movable.
        movable: MovableId,
        /// Cell the movable occupies.
        cell: CellCoord,
        /// Sub-position allocated within the cell.
        pos_in_tile: f32,
    },
    /// Confirms that a movable started moving to a new cell.
    MovableMoved {
        /// Identifier of the movable.
        movable: MovableId,
        /// Cell left behind.
        from: CellCoord,
        /// Cell now occupied.
        to: CellCoord,
        /// Sub-position allocated within the new cell.
        pos_in_tile: f32,
    },
    /// Reports that a move request was refused.
    MoveRejected {
        /// Identifier of the movable.
        movable: MovableId,
        /// Requested direction.
        direction: Direction,
    },
    /// Reports that a movable finished its transition.
    MovableSettled {
        /// Identifier of the movable.
        movable: MovableId,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
}

/// Persisted form of a whole map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapJson {
    /// Tiles indexed by row, then column.
    pub ground: Vec<Vec<TileJson>>,
}

impl MapJson {
    /// Dimensions as `(columns, rows)`, or `None` when rows are ragged.
    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let rows = u32::try_from(self.ground.len()).ok()?;
        let first = self.ground.first().map_or(0, Vec::len);
        if self.ground.iter().any(|row| row.len() != first) {
            return None;
        }
        let columns = u32::try_from(first).ok()?;
        Some((columns, rows))
    }
}

/// Persisted form of one tile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TileJson {
    /// Ground entries from bottom to top.
    pub zorder: Vec<GroundEntryJson>,
}

/// Persisted form of one ground entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundEntryJson {
    /// Catalog family.
    pub kind: String,
    /// Variant within the family.
    #[serde(rename = "type")]
    pub variant: String,
    /// Elevation of the entry.
    pub elevation: Elevation,
}

impl GroundEntryJson {
    /// Ground identity of the entry.
    #[must_use]
    pub fn ground(&self) -> GroundType {
        GroundType::new(self.kind.clone(), self.variant.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevation_band_rounds_cliffs_up() {
        assert_eq!(Elevation::whole(2).band(), 2);
        assert_eq!(Elevation::whole(2).cliff_below().band(), 2);
        assert_eq!(Elevation::whole(1).band(), 1);
        assert_eq!(Elevation::from_half_steps(1).band(), 1);
        assert_eq!(Elevation::whole(0).band(), 0);
    }

    #[test]
    fn elevation_rejects_values_off_the_half_grid() {
        assert_eq!(Elevation::from_f64(1.5), Some(Elevation::from_half_steps(3)));
        assert_eq!(Elevation::from_f64(2.0), Some(Elevation::whole(2)));
        assert_eq!(Elevation::from_f64(1.25), None);
        assert_eq!(Elevation::from_f64(f64::NAN), None);
    }

    #[test]
    fn elevation_rejects_values_beyond_the_level_limit() {
        let limit = f64::from(Elevation::MAX_LEVEL);
        assert_eq!(
            Elevation::from_f64(limit),
            Some(Elevation::whole(Elevation::MAX_LEVEL))
        );
        assert_eq!(Elevation::from_f64(limit + 0.5), None);
        assert_eq!(Elevation::from_f64(-limit - 0.5), None);
        assert!(serde_json::from_str::<Elevation>("1073741823.5").is_err());
        assert!(serde_json::from_str::<Elevation>("-1073741824").is_err());

        let highest = Elevation::whole(Elevation::MAX_LEVEL).half_above();
        assert_eq!(highest.band(), Elevation::MAX_LEVEL + 1);
        let lowest = Elevation::whole(-Elevation::MAX_LEVEL).level_below();
        assert_eq!(lowest.cliff_below().half_steps(), -2 * Elevation::MAX_LEVEL - 3);
    }

    #[test]
    fn elevation_serialises_whole_values_as_integers() {
        let whole = serde_json::to_string(&Elevation::whole(2)).expect("serialize");
        let cliff = serde_json::to_string(&Elevation::whole(2).cliff_below()).expect("serialize");
        assert_eq!(whole, "2");
        assert_eq!(cliff, "1.5");

        let parsed: Elevation = serde_json::from_str("1.5").expect("deserialize");
        assert_eq!(parsed, Elevation::from_half_steps(3));
        assert!(serde_json::from_str::<Elevation>("0.3").is_err());
    }

    #[test]
    fn whole_and_cliff_elevations_are_classified() {
        assert!(Elevation::GROUND.is_whole());
        assert!(!Elevation::GROUND.cliff_below().is_whole());
        assert!(!Elevation::from_half_steps(-1).is_whole());
    }

    #[test]
    fn descriptor_parses_sides_and_prefix() {
        let descriptor = EdgeDescriptor::parse("cliff-up-left");
        assert!(descriptor.cliff);
        assert_eq!(descriptor.edges, EdgeSet::UP | EdgeSet::LEFT);

        let middle = EdgeDescriptor::parse(MIDDLE);
        assert!(!middle.cliff);
        assert!(middle.edges.is_empty());
    }

    #[test]
    fn descriptor_joins_sides_in_canonical_order() {
        let descriptor = EdgeDescriptor::new(false, EdgeSet::RIGHT | EdgeSet::UP | EdgeSet::DOWN);
        assert_eq!(descriptor.to_variant(), "up-down-right");
        assert_eq!(EdgeDescriptor::new(true, EdgeSet::empty()).to_variant(), "cliff-middle");
    }

    #[test]
    fn descriptor_enumeration_covers_every_subset_once() {
        let plain: Vec<String> = EdgeDescriptor::all_plain()
            .map(EdgeDescriptor::to_variant)
            .collect();
        let cliff: Vec<String> = EdgeDescriptor::all_cliff()
            .map(EdgeDescriptor::to_variant)
            .collect();
        assert_eq!(plain.len(), 16);
        assert_eq!(cliff.len(), 16);
        assert_eq!(plain[0], MIDDLE);
        assert!(plain.contains(&"up-down-left-right".to_owned()));
        assert!(cliff.iter().all(|variant| variant.starts_with(CLIFF_PREFIX)));
    }

    #[test]
    fn directions_flip_and_step() {
        for direction in Direction::ALL {
            assert_eq!(direction.opposite().opposite(), direction);
        }
        let origin = CellCoord::new(0, 0);
        assert_eq!(origin.step(Direction::Up), None);
        assert_eq!(origin.step(Direction::Left), None);
        assert_eq!(origin.step(Direction::Down), Some(CellCoord::new(0, 1)));
        assert_eq!(origin.step(Direction::Right), Some(CellCoord::new(1, 0)));
    }

    #[test]
    fn fillers_and_sentinels_are_recognised() {
        assert!(GroundType::cliff_filler().is_cliff_kind());
        assert!(GroundType::new(CLIFF_KIND, "cliff-up").is_cliff_kind());
        assert!(!GroundType::middle("grass").is_cliff_kind());
        assert!(GroundType::middle(ERASE_KIND).is_erase());
        assert!(!GroundType::cliff_filler().is_erase());
    }

    #[test]
    fn ground_type_uses_type_key_in_json() {
        let json = serde_json::to_string(&GroundType::new("grass", "up-left")).expect("serialize");
        assert_eq!(json, r#"{"kind":"grass","type":"up-left"}"#);
    }

    #[test]
    fn map_dimensions_reject_ragged_rows() {
        let tile = TileJson::default();
        let square = MapJson {
            ground: vec![vec![tile.clone(), tile.clone()], vec![tile.clone(), tile.clone()]],
        };
        assert_eq!(square.dimensions(), Some((2, 2)));

        let ragged = MapJson {
            ground: vec![vec![tile.clone(), tile.clone()], vec![tile]],
        };
        assert_eq!(ragged.dimensions(), None);
    }

    #[test]
    fn null_port_tracks_live_grounds() {
        let mut port = NullRenderPort::new();
        let sprite = SpriteRef::new("ground", "grass-middle");
        let first = port.acquire_ground(CellCoord::new(0, 0), &sprite, 1.0);
        let second = port.acquire_ground(CellCoord::new(1, 0), &sprite, 1.0);
        assert_ne!(first, second);
        port.release_ground(first);
        assert_eq!(port.live_grounds(), 1);
    }
}
