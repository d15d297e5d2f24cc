//! Edge propagation between a tile and its four neighbours.

use highland_core::{
    CellCoord, Direction, EdgeDescriptor, EdgeSet, EditRejection, Elevation, GroundType,
};

use crate::{catalog::CatalogError, flatten, EditError, World};

impl World {
    /// Re-evaluates the four edges of `kind` in the band of `elevation` at `cell`.
    ///
    /// An edge is interior when both sides hold the kind in the same band and
    /// agree on showing a cliff face; interior edges are hidden on both tiles,
    /// every other edge is exposed on both. Sides facing the map border count as
    /// interior.
    pub fn fix_autotile(
        &mut self,
        cell: CellCoord,
        kind: &str,
        elevation: Elevation,
    ) -> Result<(), CatalogError> {
        let Some(index) = self.index(cell) else {
            return Ok(());
        };

        for direction in Direction::ALL {
            let own = self.tiles[index].does_kind_exist_at_elevation(kind, elevation);
            let neighbour = cell
                .step(direction)
                .and_then(|neighbour| self.index(neighbour));

            let Some(neighbour_index) = neighbour else {
                let _ = self.tiles[index].remove_edge_on_top_kind_at_elevation(
                    direction,
                    kind,
                    elevation,
                    &self.catalog,
                    self.port.as_mut(),
                )?;
                continue;
            };

            let theirs = self.tiles[neighbour_index].does_kind_exist_at_elevation(kind, elevation);
            let interior = own.found && theirs.found && own.cliff == theirs.cliff;
            let facing = direction.opposite();
            if interior {
                let _ = self.tiles[index].remove_edge_on_top_kind_at_elevation(
                    direction,
                    kind,
                    elevation,
                    &self.catalog,
                    self.port.as_mut(),
                )?;
                let _ = self.tiles[neighbour_index].remove_edge_on_top_kind_at_elevation(
                    facing,
                    kind,
                    elevation,
                    &self.catalog,
                    self.port.as_mut(),
                )?;
            } else {
                let _ = self.tiles[index].add_edge_on_top_kind_at_elevation(
                    direction,
                    kind,
                    elevation,
                    &self.catalog,
                    self.port.as_mut(),
                )?;
                let _ = self.tiles[neighbour_index].add_edge_on_top_kind_at_elevation(
                    facing,
                    kind,
                    elevation,
                    &self.catalog,
                    self.port.as_mut(),
                )?;
            }
        }
        Ok(())
    }

    /// Repaints the floor of a flat cell and re-derives the floor edges around it.
    pub fn set_tile(&mut self, cell: CellCoord, ground: &GroundType) -> Result<bool, CatalogError> {
        flatten(self.try_set_tile(cell, ground))
    }

    /// Single-layer paint reporting why the edit was refused.
    ///
    /// Only cells whose stack does not rise above the ground floor can be
    /// repainted. The floor entry is replaced and the cell's own descriptor is
    /// computed from the floor kinds of its neighbours, which in turn expose or
    /// hide the side facing it.
    pub fn try_set_tile(&mut self, cell: CellCoord, ground: &GroundType) -> Result<(), EditError> {
        let index = self.index(cell).ok_or(EditRejection::OutOfBounds)?;
        let tile = &self.tiles[index];
        if tile.elevation_on_top() > Elevation::GROUND {
            return Err(EditRejection::NotFlat.into());
        }
        match tile.ground_on_top_at_elevation(Elevation::GROUND) {
            None => return Err(EditRejection::MissingEntry.into()),
            Some(current) if current.kind == ground.kind => {
                return Err(EditRejection::DuplicateKind.into())
            }
            Some(_) => {}
        }

        let mut edges = EdgeSet::empty();
        let mut neighbours = Vec::with_capacity(Direction::ALL.len());
        for direction in Direction::ALL {
            let Some(neighbour_index) = cell
                .step(direction)
                .and_then(|neighbour| self.index(neighbour))
            else {
                continue;
            };
            let neighbour_kind = self.tiles[neighbour_index]
                .ground_on_top_at_elevation(Elevation::GROUND)
                .map(|floor| floor.kind.clone());
            if neighbour_kind.as_deref() != Some(ground.kind.as_str()) {
                edges |= direction.edge();
            }
            if let Some(kind) = neighbour_kind {
                neighbours.push((neighbour_index, direction.opposite(), kind));
            }
        }

        let painted = GroundType::new(
            ground.kind.clone(),
            EdgeDescriptor::new(false, edges).to_variant(),
        );
        let _ = self.tiles[index].replace_ground_on_top_at_elevation(
            painted,
            Elevation::GROUND,
            &self.catalog,
            self.port.as_mut(),
        )?;

        for (neighbour_index, facing, kind) in neighbours {
            let tile = &mut self.tiles[neighbour_index];
            let _ = if kind == ground.kind {
                tile.remove_edge_on_top_kind_at_elevation(
                    facing,
                    &kind,
                    Elevation::GROUND,
                    &self.catalog,
                    self.port.as_mut(),
                )?
            } else {
                tile.add_edge_on_top_kind_at_elevation(
                    facing,
                    &kind,
                    Elevation::GROUND,
                    &self.catalog,
                    self.port.as_mut(),
                )?
            };
        }

        self.fix_effects(cell);
        Ok(())
    }
}
