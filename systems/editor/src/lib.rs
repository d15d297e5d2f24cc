#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure map editor system that turns palette selections and cursor actions into tile commands.

use highland_core::{
    CellCoord, Command, EditRejection, Elevation, Event, GroundType, MapJson, SpriteRef,
    CLIFF_KIND, ERASE_KIND, MIDDLE,
};
use highland_world::{GroundCatalog, LoadError, World};
use thiserror::Error;
use tracing::{debug, info};

/// Layer a palette selection paints on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditLayer {
    /// Repaints the floor of flat cells without stacking.
    Floor,
    /// Stacks grounds at the working elevation.
    #[default]
    Stack,
}

/// Input snapshot distilled from adapter-provided editor actions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditorInput {
    /// Ground picked from the palette on this frame, with the layer it targets.
    pub select: Option<(GroundType, EditLayer)>,
    /// Cell the selected ground is painted onto.
    pub paint: Option<CellCoord>,
    /// Cell whose top ground at the working elevation is removed.
    pub erase: Option<CellCoord>,
    /// New visibility of the grid overlay.
    pub toggle_grid: Option<bool>,
    /// Raises the working elevation by one level.
    pub raise: bool,
    /// Lowers the working elevation by one level, never below the floor.
    pub lower: bool,
}

/// Editor system that translates selections and cursor actions into world commands.
#[derive(Clone, Debug)]
pub struct Editor {
    selected: Option<GroundType>,
    layer: EditLayer,
    elevation: Elevation,
    show_grid: bool,
    last_rejection: Option<(CellCoord, EditRejection)>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    /// Creates an editor with nothing selected, working on the floor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            selected: None,
            layer: EditLayer::Stack,
            elevation: Elevation::GROUND,
            show_grid: false,
            last_rejection: None,
        }
    }

    /// Ground currently selected in the palette.
    #[must_use]
    pub fn selected(&self) -> Option<&GroundType> {
        self.selected.as_ref()
    }

    /// Layer the current selection paints on.
    #[must_use]
    pub const fn layer(&self) -> EditLayer {
        self.layer
    }

    /// Elevation new grounds are stacked at.
    #[must_use]
    pub const fn elevation(&self) -> Elevation {
        self.elevation
    }

    /// Whether the grid overlay is visible.
    #[must_use]
    pub const fn show_grid(&self) -> bool {
        self.show_grid
    }

    /// Most recent edit the world refused, if any.
    #[must_use]
    pub const fn last_rejection(&self) -> Option<(CellCoord, EditRejection)> {
        self.last_rejection
    }

    /// Consumes world events and editor input to emit tile commands.
    ///
    /// Painting with the erase sentinel selected removes instead of adding.
    /// Floor painting ignores the working elevation.
    pub fn handle(&mut self, events: &[Event], input: EditorInput, out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::EditRejected { cell, reason } => {
                    self.last_rejection = Some((*cell, *reason));
                }
                Event::TileAdded { .. } | Event::TileDeleted { .. } | Event::TileSet { .. } => {
                    self.last_rejection = None;
                }
                _ => {}
            }
        }

        if let Some((ground, layer)) = input.select {
            debug!(%ground, ?layer, "selected ground");
            self.selected = Some(ground);
            self.layer = layer;
        }
        if let Some(visible) = input.toggle_grid {
            self.show_grid = visible;
        }
        if input.raise {
            self.elevation = Elevation::whole(self.elevation.band() + 1);
        }
        if input.lower && self.elevation > Elevation::GROUND {
            self.elevation = Elevation::whole(self.elevation.band() - 1);
        }

        if let Some(cell) = input.paint {
            if let Some(command) = self.paint_command(cell) {
                out.push(command);
            }
        }
        if let Some(cell) = input.erase {
            out.push(Command::DeleteTile {
                cell,
                elevation: self.working_elevation(),
            });
        }
    }

    fn paint_command(&self, cell: CellCoord) -> Option<Command> {
        let ground = self.selected.as_ref()?;
        if ground.is_erase() {
            return Some(Command::DeleteTile {
                cell,
                elevation: self.working_elevation(),
            });
        }
        Some(match self.layer {
            EditLayer::Floor => Command::SetTile {
                cell,
                ground: ground.clone(),
            },
            EditLayer::Stack => Command::AddTile {
                cell,
                ground: ground.clone(),
                elevation: self.elevation,
            },
        })
    }

    fn working_elevation(&self) -> Elevation {
        match self.layer {
            EditLayer::Floor => Elevation::GROUND,
            EditLayer::Stack => self.elevation,
        }
    }
}

/// Errors raised while turning a saved blob back into a map.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The blob is not valid map JSON.
    #[error("map blob is not valid JSON")]
    Parse(#[from] serde_json::Error),
    /// The map could not be rebuilt from the blob.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Serialises the map into a JSON blob suitable for a file or clipboard.
pub fn save(world: &World) -> Result<String, BlobError> {
    let blob = serde_json::to_string(&world.save_to_json())?;
    info!(bytes = blob.len(), "saved map");
    Ok(blob)
}

/// Replaces the map with the one stored in a JSON blob.
pub fn load(world: &mut World, blob: &str) -> Result<(), BlobError> {
    let map: MapJson = serde_json::from_str(blob)?;
    world.load_from_json(&map)?;
    info!(bytes = blob.len(), "loaded map");
    Ok(())
}

/// One selectable ground in the palette.
#[derive(Clone, Debug, PartialEq)]
pub struct PaletteEntry {
    /// Ground painted when the entry is picked.
    pub ground: GroundType,
    /// Sprite shown for the entry, absent for the erase tool.
    pub sprite: Option<SpriteRef>,
}

/// Grounds an editor may offer, one per paintable kind plus the erase tool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Lists the `middle` variant of every kind except the cliff filler.
    #[must_use]
    pub fn from_catalog(catalog: &GroundCatalog) -> Self {
        let mut entries: Vec<PaletteEntry> = catalog
            .kinds()
            .filter(|kind| *kind != CLIFF_KIND)
            .filter_map(|kind| {
                let spec = catalog.spec(kind, MIDDLE).ok()?;
                Some(PaletteEntry {
                    ground: GroundType::middle(kind),
                    sprite: Some(spec.sprite.clone()),
                })
            })
            .collect();
        entries.push(PaletteEntry {
            ground: GroundType::middle(ERASE_KIND),
            sprite: None,
        });
        Self { entries }
    }

    /// Entries in display order.
    #[must_use]
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Finds the entry painting the provided kind.
    #[must_use]
    pub fn find(&self, kind: &str) -> Option<&PaletteEntry> {
        self.entries.iter().find(|entry| entry.ground.kind == kind)
    }
}
