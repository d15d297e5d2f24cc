use std::sync::Arc;

use highland_core::{
    CellCoord, Command, EditRejection, Elevation, Event, GroundType, NullRenderPort, ERASE_KIND,
};
use highland_system_editor::{load, save, BlobError, EditLayer, Editor, EditorInput, Palette};
use highland_world::{apply, query, GroundCatalog, World, WorldConfig};

fn catalog() -> Arc<GroundCatalog> {
    Arc::new(
        GroundCatalog::from_json_str(include_str!("../../../assets/ground.json"))
            .expect("shipped catalog must validate"),
    )
}

fn world() -> World {
    World::new(
        WorldConfig {
            columns: 4,
            rows: 4,
            ..WorldConfig::default()
        },
        catalog(),
        Box::new(NullRenderPort::new()),
    )
    .expect("default ground is catalogued")
}

fn select(ground: GroundType, layer: EditLayer) -> EditorInput {
    EditorInput {
        select: Some((ground, layer)),
        ..EditorInput::default()
    }
}

#[test]
fn painting_without_a_selection_emits_nothing() {
    let mut editor = Editor::new();
    let mut commands = Vec::new();

    editor.handle(
        &[],
        EditorInput {
            paint: Some(CellCoord::new(1, 1)),
            ..EditorInput::default()
        },
        &mut commands,
    );

    assert!(commands.is_empty(), "nothing selected, nothing to paint");
}

#[test]
fn painting_stacks_at_the_working_elevation() {
    let mut editor = Editor::new();
    let mut commands = Vec::new();

    editor.handle(
        &[],
        EditorInput {
            raise: true,
            paint: Some(CellCoord::new(2, 1)),
            ..select(GroundType::middle("grass"), EditLayer::Stack)
        },
        &mut commands,
    );

    assert_eq!(
        commands,
        vec![Command::AddTile {
            cell: CellCoord::new(2, 1),
            ground: GroundType::middle("grass"),
            elevation: Elevation::whole(2),
        }],
        "raise applies before painting on the same frame",
    );
}

#[test]
fn erase_sentinel_turns_paint_into_delete() {
    let mut editor = Editor::new();
    let mut commands = Vec::new();

    editor.handle(
        &[],
        select(GroundType::middle(ERASE_KIND), EditLayer::Stack),
        &mut commands,
    );
    editor.handle(
        &[],
        EditorInput {
            paint: Some(CellCoord::new(0, 3)),
            ..EditorInput::default()
        },
        &mut commands,
    );

    assert_eq!(
        commands,
        vec![Command::DeleteTile {
            cell: CellCoord::new(0, 3),
            elevation: Elevation::GROUND,
        }],
        "painting with the erase tool deletes",
    );
}

#[test]
fn floor_layer_repaints_instead_of_stacking() {
    let mut editor = Editor::new();
    let mut commands = Vec::new();

    editor.handle(
        &[],
        EditorInput {
            raise: true,
            paint: Some(CellCoord::new(1, 0)),
            ..select(GroundType::middle("sand"), EditLayer::Floor)
        },
        &mut commands,
    );

    assert_eq!(
        commands,
        vec![Command::SetTile {
            cell: CellCoord::new(1, 0),
            ground: GroundType::middle("sand"),
        }]
    );
}

#[test]
fn working_elevation_never_drops_below_the_floor() {
    let mut editor = Editor::new();
    let mut commands = Vec::new();

    editor.handle(
        &[],
        EditorInput {
            lower: true,
            ..EditorInput::default()
        },
        &mut commands,
    );
    assert_eq!(editor.elevation(), Elevation::GROUND);

    for _ in 0..2 {
        editor.handle(
            &[],
            EditorInput {
                raise: true,
                ..EditorInput::default()
            },
            &mut commands,
        );
    }
    editor.handle(
        &[],
        EditorInput {
            lower: true,
            ..EditorInput::default()
        },
        &mut commands,
    );
    assert_eq!(editor.elevation(), Elevation::whole(2));
    assert!(commands.is_empty());
}

#[test]
fn grid_toggle_only_changes_editor_state() {
    let mut editor = Editor::new();
    let mut commands = Vec::new();

    editor.handle(
        &[],
        EditorInput {
            toggle_grid: Some(true),
            ..EditorInput::default()
        },
        &mut commands,
    );

    assert!(editor.show_grid());
    assert!(commands.is_empty());
}

#[test]
fn rejections_are_remembered_until_the_next_successful_edit() {
    let mut editor = Editor::new();
    let mut commands = Vec::new();
    let cell = CellCoord::new(3, 3);

    editor.handle(
        &[Event::EditRejected {
            cell,
            reason: EditRejection::Unsupported,
        }],
        EditorInput::default(),
        &mut commands,
    );
    assert_eq!(
        editor.last_rejection(),
        Some((cell, EditRejection::Unsupported))
    );

    editor.handle(
        &[Event::TileSet {
            cell,
            ground: GroundType::middle("grass"),
        }],
        EditorInput::default(),
        &mut commands,
    );
    assert_eq!(editor.last_rejection(), None);
}

#[test]
fn editor_commands_drive_the_world() {
    let mut world = world();
    let mut editor = Editor::new();
    let mut commands = Vec::new();
    let mut events = Vec::new();

    editor.handle(
        &events,
        EditorInput {
            paint: Some(CellCoord::new(1, 1)),
            ..select(GroundType::middle("grass"), EditLayer::Stack)
        },
        &mut commands,
    );
    for command in commands.drain(..) {
        apply(&mut world, command, &mut events).expect("catalogued");
    }

    let tile = query::tile(&world, CellCoord::new(1, 1)).expect("inside grid");
    assert_eq!(tile.ground_on_top().map(|ground| ground.kind.as_str()), Some("grass"));
    assert!(matches!(events.as_slice(), [Event::TileAdded { .. }]));
}

#[test]
fn saved_blobs_reload_into_the_same_map() {
    let mut source = world();
    assert!(source
        .add_tile(CellCoord::new(1, 1), &GroundType::middle("grass"), Elevation::whole(2))
        .expect("catalogued"));
    let blob = save(&source).expect("serializable");

    let mut target = world();
    load(&mut target, &blob).expect("blob from the same sized map");
    assert_eq!(target.save_to_json(), source.save_to_json());
}

#[test]
fn malformed_blobs_are_rejected() {
    let mut world = world();
    let error = load(&mut world, "{ not json").expect_err("broken blob");
    assert!(matches!(error, BlobError::Parse(_)));
}

#[test]
fn blobs_with_runaway_elevations_are_rejected() {
    let mut source = world();
    assert!(source
        .add_tile(CellCoord::new(1, 1), &GroundType::middle("grass"), Elevation::whole(2))
        .expect("catalogued"));
    let blob = save(&source).expect("serializable");
    assert!(blob.contains("\"elevation\":2"), "raised grass is saved: {blob}");

    for runaway in ["1073741823.5", "-1073741824"] {
        let corrupt = blob.replacen(
            "\"elevation\":2",
            &format!("\"elevation\":{runaway}"),
            1,
        );
        let mut target = world();
        let before = target.save_to_json();
        let error = load(&mut target, &corrupt).expect_err("elevation out of range");
        assert!(matches!(error, BlobError::Parse(_)), "{runaway}: {error:?}");
        assert_eq!(target.save_to_json(), before);
    }
}

#[test]
fn palette_lists_paintable_kinds_and_the_eraser() {
    let palette = Palette::from_catalog(&catalog());
    let kinds: Vec<&str> = palette
        .entries()
        .iter()
        .map(|entry| entry.ground.kind.as_str())
        .collect();

    assert_eq!(kinds, vec!["grass", "sand", "water", ERASE_KIND]);
    assert!(palette.entries().iter().all(|entry| entry.ground.variant == "middle"));
    assert!(palette.find(ERASE_KIND).is_some_and(|entry| entry.sprite.is_none()));
    assert!(palette.find("rock").is_none(), "cliff fillers are placed automatically");
}
