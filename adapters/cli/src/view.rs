use std::fmt::Write as _;

use highland_core::CellCoord;
use highland_world::{query, World, WATER_KIND};

/// Draws the map as text, two characters per cell.
///
/// The first character is the initial of the top kind (`~` for water),
/// upper-cased when a movable stands on the cell. The second is the top
/// elevation level, with `'` marking a bare cliff band.
pub(crate) fn render_ascii(world: &World) -> String {
    let (columns, rows) = query::dimensions(world);
    let mut out = String::new();
    for row in 0..rows {
        for column in 0..columns {
            let cell = CellCoord::new(column, row);
            let Some(tile) = query::tile(world, cell) else {
                continue;
            };
            if column > 0 {
                out.push(' ');
            }
            let occupied = !query::occupants(world, cell).is_empty();
            let glyph = tile
                .ground_on_top()
                .map_or('?', |ground| kind_glyph(&ground.kind, occupied));
            let elevation = tile.elevation_on_top();
            out.push(glyph);
            if elevation.is_whole() {
                let _ = write!(out, "{}", elevation.band());
            } else {
                out.push('\'');
            }
        }
        out.push('\n');
    }
    out
}

fn kind_glyph(kind: &str, occupied: bool) -> char {
    let glyph = if kind == WATER_KIND {
        '~'
    } else {
        kind.chars().next().unwrap_or('?')
    };
    if occupied {
        glyph.to_ascii_uppercase()
    } else {
        glyph
    }
}
