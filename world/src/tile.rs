//! Single grid cell holding an elevation-sorted stack of ground entries.

use highland_core::{
    CellCoord, CellEffects, Direction, EdgeDescriptor, Elevation, GroundEntryJson, GroundSpec,
    GroundType, RenderPort, TileJson, TopPassable, VisualHandle,
};
use tracing::trace;

use crate::catalog::{CatalogError, GroundCatalog};

/// Kind drawn beneath every elevation so land edges stay visible.
pub const WATER_KIND: &str = "water";

/// One layer of a tile's z-order.
#[derive(Clone, Debug)]
pub struct GroundEntry {
    elevation: Elevation,
    ground: GroundType,
    spec: GroundSpec,
    visual: VisualHandle,
}

impl GroundEntry {
    /// Elevation the entry sits at.
    #[must_use]
    pub const fn elevation(&self) -> Elevation {
        self.elevation
    }

    /// Ground identity currently shown by the entry.
    #[must_use]
    pub fn ground(&self) -> &GroundType {
        &self.ground
    }

    /// Spec resolved from the catalog for the current identity.
    #[must_use]
    pub fn spec(&self) -> &GroundSpec {
        &self.spec
    }

    /// Visual handle owned by the entry.
    #[must_use]
    pub const fn visual(&self) -> VisualHandle {
        self.visual
    }
}

/// Result of searching a tile's elevation band for a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindPresence {
    /// Whether the kind exists in the band.
    pub found: bool,
    /// Whether the band shows a bare cliff face rather than a surface.
    pub cliff: bool,
}

/// A grid cell and its z-order of ground entries.
#[derive(Clone, Debug)]
pub struct Tile {
    cell: CellCoord,
    zorder: Vec<GroundEntry>,
    effects: CellEffects,
}

impl Tile {
    /// Creates a tile holding a single base entry.
    pub fn new(
        cell: CellCoord,
        ground: GroundType,
        elevation: Elevation,
        catalog: &GroundCatalog,
        port: &mut dyn RenderPort,
    ) -> Result<Self, CatalogError> {
        let spec = catalog.spec_of(&ground)?.clone();
        let depth = render_depth(cell, &ground, elevation);
        let visual = port.acquire_ground(cell, &spec.sprite, depth);
        Ok(Self {
            cell,
            zorder: vec![GroundEntry {
                elevation,
                ground,
                spec,
                visual,
            }],
            effects: CellEffects::default(),
        })
    }

    /// Cell the tile occupies.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Entries from bottom to top.
    #[must_use]
    pub fn zorder(&self) -> &[GroundEntry] {
        &self.zorder
    }

    /// Overlays last derived for the tile.
    #[must_use]
    pub fn effects(&self) -> &CellEffects {
        &self.effects
    }

    pub(crate) fn replace_effects(&mut self, effects: CellEffects) -> bool {
        if self.effects == effects {
            return false;
        }
        self.effects = effects;
        true
    }

    /// Inserts a ground after every entry at or below `elevation`.
    ///
    /// Returns `Ok(false)` when the top entry at that elevation already has the
    /// same kind.
    pub fn add_ground_on_top_at_elevation(
        &mut self,
        ground: GroundType,
        elevation: Elevation,
        catalog: &GroundCatalog,
        port: &mut dyn RenderPort,
    ) -> Result<bool, CatalogError> {
        if self
            .ground_on_top_at_elevation(elevation)
            .is_some_and(|top| top.kind == ground.kind)
        {
            return Ok(false);
        }

        self.push_ground_at_elevation(ground, elevation, catalog, port)?;
        Ok(true)
    }

    /// Inserts a ground without the same-kind check, used when replaying snapshots.
    pub(crate) fn push_ground_at_elevation(
        &mut self,
        ground: GroundType,
        elevation: Elevation,
        catalog: &GroundCatalog,
        port: &mut dyn RenderPort,
    ) -> Result<(), CatalogError> {
        let spec = catalog.spec_of(&ground)?.clone();
        let visual = port.acquire_ground(
            self.cell,
            &spec.sprite,
            render_depth(self.cell, &ground, elevation),
        );
        let position = self
            .zorder
            .iter()
            .position(|entry| entry.elevation > elevation)
            .unwrap_or(self.zorder.len());
        self.zorder.insert(
            position,
            GroundEntry {
                elevation,
                ground,
                spec,
                visual,
            },
        );
        Ok(())
    }

    /// Removes the highest entry at exactly `elevation`, releasing its visual.
    pub fn delete_ground_on_top_at_elevation(
        &mut self,
        elevation: Elevation,
        port: &mut dyn RenderPort,
    ) -> Option<GroundType> {
        let index = self.top_index_at_elevation(elevation)?;
        let removed = self.zorder.remove(index);
        port.release_ground(removed.visual);
        Some(removed.ground)
    }

    /// Swaps the highest entry at `elevation` for another ground.
    pub fn replace_ground_on_top_at_elevation(
        &mut self,
        ground: GroundType,
        elevation: Elevation,
        catalog: &GroundCatalog,
        port: &mut dyn RenderPort,
    ) -> Result<bool, CatalogError> {
        let Some(index) = self.top_index_at_elevation(elevation) else {
            return Ok(false);
        };
        let spec = catalog.spec_of(&ground)?.clone();
        let visual = port.acquire_ground(
            self.cell,
            &spec.sprite,
            render_depth(self.cell, &ground, elevation),
        );
        let entry = &mut self.zorder[index];
        port.release_ground(entry.visual);
        entry.ground = ground;
        entry.spec = spec;
        entry.visual = visual;
        Ok(true)
    }

    /// Ground of the highest entry at exactly `elevation`.
    #[must_use]
    pub fn ground_on_top_at_elevation(&self, elevation: Elevation) -> Option<&GroundType> {
        self.top_index_at_elevation(elevation)
            .map(|index| &self.zorder[index].ground)
    }

    /// Elevation of the topmost entry, the walkable surface of the cell.
    #[must_use]
    pub fn elevation_on_top(&self) -> Elevation {
        self.zorder
            .last()
            .map_or(Elevation::GROUND, |entry| entry.elevation)
    }

    /// Ground of the topmost entry.
    #[must_use]
    pub fn ground_on_top(&self) -> Option<&GroundType> {
        self.zorder.last().map(|entry| &entry.ground)
    }

    /// Number of entries at exactly `elevation`.
    #[must_use]
    pub fn num_grounds_at_elevation(&self, elevation: Elevation) -> usize {
        self.zorder
            .iter()
            .filter(|entry| entry.elevation == elevation)
            .count()
    }

    /// Searches the band of `elevation` from the top for `kind`.
    ///
    /// `cliff` stays set until an entry of another kind than rock is met, so a
    /// band holding only rock reports a bare cliff face.
    #[must_use]
    pub fn does_kind_exist_at_elevation(&self, kind: &str, elevation: Elevation) -> KindPresence {
        let mut presence = KindPresence {
            found: false,
            cliff: true,
        };
        for entry in self
            .zorder
            .iter()
            .rev()
            .filter(|entry| entry.elevation.band() == elevation.band())
        {
            if !entry.ground.is_cliff_kind() {
                presence.cliff = false;
            }
            if entry.ground.kind == kind {
                presence.found = true;
                break;
            }
        }
        presence
    }

    /// Exposes the `direction` side of the top `kind` entry in the band.
    pub fn add_edge_on_top_kind_at_elevation(
        &mut self,
        direction: Direction,
        kind: &str,
        elevation: Elevation,
        catalog: &GroundCatalog,
        port: &mut dyn RenderPort,
    ) -> Result<bool, CatalogError> {
        self.rewrite_edge(direction, true, kind, elevation, catalog, port)
    }

    /// Hides the `direction` side of the top `kind` entry in the band.
    pub fn remove_edge_on_top_kind_at_elevation(
        &mut self,
        direction: Direction,
        kind: &str,
        elevation: Elevation,
        catalog: &GroundCatalog,
        port: &mut dyn RenderPort,
    ) -> Result<bool, CatalogError> {
        self.rewrite_edge(direction, false, kind, elevation, catalog, port)
    }

    fn rewrite_edge(
        &mut self,
        direction: Direction,
        exposed: bool,
        kind: &str,
        elevation: Elevation,
        catalog: &GroundCatalog,
        port: &mut dyn RenderPort,
    ) -> Result<bool, CatalogError> {
        let presence = self.does_kind_exist_at_elevation(kind, elevation);
        let Some(index) = self.top_index_of_kind_in_band(kind, elevation) else {
            return Ok(false);
        };

        let entry = &mut self.zorder[index];
        let mut descriptor = EdgeDescriptor::parse(&entry.ground.variant);
        descriptor.edges.set(direction.edge(), exposed);
        descriptor.cliff = presence.cliff;
        let variant = descriptor.to_variant();
        if variant == entry.ground.variant {
            return Ok(false);
        }

        let spec = catalog.spec(kind, &variant)?.clone();
        port.relabel_ground(entry.visual, &spec.sprite);
        trace!(
            cell = %self.cell,
            kind,
            from = %entry.ground.variant,
            to = %variant,
            "relabelled ground"
        );
        entry.ground.variant = variant;
        entry.spec = spec;
        Ok(true)
    }

    /// Restores the variant of the entry at `index`, relabelling when it differs.
    pub(crate) fn restore_variant(
        &mut self,
        index: usize,
        variant: &str,
        catalog: &GroundCatalog,
        port: &mut dyn RenderPort,
    ) -> Result<(), CatalogError> {
        let Some(entry) = self.zorder.get_mut(index) else {
            return Ok(());
        };
        if entry.ground.variant == variant {
            return Ok(());
        }
        let spec = catalog.spec(&entry.ground.kind, variant)?.clone();
        port.relabel_ground(entry.visual, &spec.sprite);
        entry.ground.variant = variant.to_owned();
        entry.spec = spec;
        Ok(())
    }

    /// Combines passability across every entry.
    ///
    /// Sides are OR-ed and the radius is the smallest declared one, falling
    /// back to `default_radius`.
    #[must_use]
    pub fn top_passable(&self, default_radius: f32) -> TopPassable {
        let mut combined = TopPassable {
            up: false,
            down: false,
            left: false,
            right: false,
            radius: default_radius,
        };
        let mut declared: Option<f32> = None;
        for entry in &self.zorder {
            let passable = &entry.spec.passable;
            combined.up |= passable.up;
            combined.down |= passable.down;
            combined.left |= passable.left;
            combined.right |= passable.right;
            if let Some(radius) = passable.radius {
                declared = Some(declared.map_or(radius, |current| current.min(radius)));
            }
        }
        if let Some(radius) = declared {
            combined.radius = radius;
        }
        combined
    }

    /// Flattens the z-order into its persisted form.
    #[must_use]
    pub fn save_to_json(&self) -> TileJson {
        TileJson {
            zorder: self
                .zorder
                .iter()
                .map(|entry| GroundEntryJson {
                    kind: entry.ground.kind.clone(),
                    variant: entry.ground.variant.clone(),
                    elevation: entry.elevation,
                })
                .collect(),
        }
    }

    /// Releases every visual owned by the tile.
    pub(crate) fn release_all(&mut self, port: &mut dyn RenderPort) {
        for entry in self.zorder.drain(..) {
            port.release_ground(entry.visual);
        }
    }

    fn top_index_at_elevation(&self, elevation: Elevation) -> Option<usize> {
        self.zorder
            .iter()
            .rposition(|entry| entry.elevation == elevation)
    }

    fn top_index_of_kind_in_band(&self, kind: &str, elevation: Elevation) -> Option<usize> {
        self.zorder.iter().rposition(|entry| {
            entry.elevation.band() == elevation.band() && entry.ground.kind == kind
        })
    }
}

/// Depth a ground is drawn at: its row plus its elevation, water always at zero.
#[must_use]
pub fn render_depth(cell: CellCoord, ground: &GroundType, elevation: Elevation) -> f32 {
    if ground.kind == WATER_KIND {
        0.0
    } else {
        cell.row() as f32 + elevation.as_f32()
    }
}

#[cfg(test)]
mod tests {
    use highland_core::{NullRenderPort, CLIFF_KIND, MIDDLE};

    use super::*;

    fn catalog() -> GroundCatalog {
        GroundCatalog::from_json_str(include_str!("../../assets/ground.json"))
            .expect("shipped catalog must validate")
    }

    fn tile(port: &mut NullRenderPort, catalog: &GroundCatalog) -> Tile {
        Tile::new(
            CellCoord::new(2, 3),
            GroundType::middle(WATER_KIND),
            Elevation::GROUND,
            catalog,
            port,
        )
        .expect("water is catalogued")
    }

    #[test]
    fn entries_stay_sorted_and_stable_by_elevation() {
        let catalog = catalog();
        let mut port = NullRenderPort::new();
        let mut tile = tile(&mut port, &catalog);

        let added = [
            (GroundType::middle("grass"), Elevation::whole(2)),
            (GroundType::cliff_filler(), Elevation::whole(2).cliff_below()),
            (GroundType::middle("sand"), Elevation::GROUND),
            (GroundType::middle("sand"), Elevation::whole(2)),
        ];
        for (ground, elevation) in added {
            assert!(tile
                .add_ground_on_top_at_elevation(ground, elevation, &catalog, &mut port)
                .expect("catalogued"));
        }

        let order: Vec<(String, Elevation)> = tile
            .zorder()
            .iter()
            .map(|entry| (entry.ground().kind.clone(), entry.elevation()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("water".to_owned(), Elevation::GROUND),
                ("sand".to_owned(), Elevation::GROUND),
                ("rock".to_owned(), Elevation::from_half_steps(3)),
                ("grass".to_owned(), Elevation::whole(2)),
                ("sand".to_owned(), Elevation::whole(2)),
            ]
        );
        assert_eq!(tile.elevation_on_top(), Elevation::whole(2));
        assert_eq!(tile.num_grounds_at_elevation(Elevation::whole(2)), 2);
        assert_eq!(port.live_grounds(), 5);
    }

    #[test]
    fn adding_same_kind_on_top_is_a_no_op() {
        let catalog = catalog();
        let mut port = NullRenderPort::new();
        let mut tile = tile(&mut port, &catalog);

        let added = tile
            .add_ground_on_top_at_elevation(
                GroundType::middle(WATER_KIND),
                Elevation::GROUND,
                &catalog,
                &mut port,
            )
            .expect("catalogued");
        assert!(!added);
        assert_eq!(tile.zorder().len(), 1);
    }

    #[test]
    fn deleting_missing_elevation_is_silent() {
        let catalog = catalog();
        let mut port = NullRenderPort::new();
        let mut tile = tile(&mut port, &catalog);

        assert_eq!(
            tile.delete_ground_on_top_at_elevation(Elevation::whole(3), &mut port),
            None
        );
        assert_eq!(tile.ground_on_top_at_elevation(Elevation::whole(3)), None);
        assert_eq!(port.live_grounds(), 1);
    }

    #[test]
    fn band_search_distinguishes_cliff_faces() {
        let catalog = catalog();
        let mut port = NullRenderPort::new();
        let mut tile = tile(&mut port, &catalog);
        let cliff = Elevation::whole(2).cliff_below();
        let _ = tile
            .add_ground_on_top_at_elevation(GroundType::cliff_filler(), cliff, &catalog, &mut port)
            .expect("catalogued");

        let bare = tile.does_kind_exist_at_elevation(CLIFF_KIND, cliff);
        assert_eq!(bare, KindPresence { found: true, cliff: true });

        let _ = tile
            .add_ground_on_top_at_elevation(
                GroundType::middle("grass"),
                Elevation::whole(2),
                &catalog,
                &mut port,
            )
            .expect("catalogued");
        let covered = tile.does_kind_exist_at_elevation(CLIFF_KIND, cliff);
        assert_eq!(covered, KindPresence { found: true, cliff: false });

        let absent = tile.does_kind_exist_at_elevation("sand", Elevation::whole(2));
        assert!(!absent.found);
    }

    #[test]
    fn edge_rewrites_are_idempotent_and_prefixed() {
        let catalog = catalog();
        let mut port = NullRenderPort::new();
        let mut tile = tile(&mut port, &catalog);
        let cliff = Elevation::whole(2).cliff_below();
        let _ = tile
            .add_ground_on_top_at_elevation(GroundType::cliff_filler(), cliff, &catalog, &mut port)
            .expect("catalogued");

        for _ in 0..2 {
            for direction in [Direction::Left, Direction::Up] {
                let _ = tile
                    .add_edge_on_top_kind_at_elevation(
                        direction, CLIFF_KIND, cliff, &catalog, &mut port,
                    )
                    .expect("catalogued");
            }
        }
        assert_eq!(
            tile.ground_on_top_at_elevation(cliff).map(|ground| ground.variant.as_str()),
            Some("cliff-up-left")
        );

        let changed = tile
            .remove_edge_on_top_kind_at_elevation(
                Direction::Down,
                CLIFF_KIND,
                cliff,
                &catalog,
                &mut port,
            )
            .expect("catalogued");
        assert!(!changed, "removing an absent edge must not relabel");

        for direction in [Direction::Up, Direction::Left] {
            let _ = tile
                .remove_edge_on_top_kind_at_elevation(
                    direction, CLIFF_KIND, cliff, &catalog, &mut port,
                )
                .expect("catalogued");
        }
        assert_eq!(
            tile.ground_on_top_at_elevation(cliff).map(|ground| ground.variant.as_str()),
            Some("cliff-middle")
        );
    }

    #[test]
    fn combined_passability_ors_sides_and_takes_smallest_radius() {
        let catalog = catalog();
        let mut port = NullRenderPort::new();
        let mut tile = tile(&mut port, &catalog);

        let water_only = tile.top_passable(catalog.default_radius());
        assert!(!water_only.up && !water_only.left);
        assert_eq!(water_only.radius, catalog.default_radius());

        let _ = tile
            .add_ground_on_top_at_elevation(
                GroundType::middle("sand"),
                Elevation::GROUND,
                &catalog,
                &mut port,
            )
            .expect("catalogued");
        let combined = tile.top_passable(catalog.default_radius());
        assert!(combined.up && combined.down && combined.left && combined.right);
        assert_eq!(combined.radius, 0.25);
    }

    #[test]
    fn water_renders_beneath_everything() {
        let cell = CellCoord::new(0, 4);
        assert_eq!(render_depth(cell, &GroundType::middle(WATER_KIND), Elevation::whole(2)), 0.0);
        assert_eq!(render_depth(cell, &GroundType::middle("grass"), Elevation::whole(2)), 6.0);
        assert_eq!(
            render_depth(cell, &GroundType::new(CLIFF_KIND, MIDDLE), Elevation::from_half_steps(3)),
            5.5
        );
    }

    #[test]
    fn saved_entries_follow_zorder() {
        let catalog = catalog();
        let mut port = NullRenderPort::new();
        let mut tile = tile(&mut port, &catalog);
        let _ = tile
            .add_ground_on_top_at_elevation(
                GroundType::middle("grass"),
                Elevation::GROUND,
                &catalog,
                &mut port,
            )
            .expect("catalogued");

        let saved = tile.save_to_json();
        let kinds: Vec<&str> = saved.zorder.iter().map(|entry| entry.kind.as_str()).collect();
        assert_eq!(kinds, vec!["water", "grass"]);
    }
}
