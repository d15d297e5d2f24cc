//! Subcommands of the `highland` binary.

use std::{
    cell::RefCell,
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    rc::Rc,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use highland_core::{
    CellCoord, Command, Direction, Event, GroundType, MapJson, MovableType, NullRenderPort,
    RenderPort, ERASE_KIND,
};
use highland_rendering::{RenderingBackend, Scene, SceneRecorder, TextBackend};
use highland_system_editor::{self as editor, EditLayer, Editor, EditorInput};
use highland_system_movement::Movement;
use highland_system_script::{Program, Script};
use highland_world::{apply, query, GroundCatalog, World, WorldConfig};
use tracing::{debug, info};

use crate::{config::Config, transfer, view};

/// Settings and catalog shared by every subcommand.
#[derive(Debug)]
pub(crate) struct Session {
    config: Config,
    catalog: Arc<GroundCatalog>,
}

impl Session {
    /// Reads the ground catalog named by the configuration.
    pub(crate) fn open(config: Config) -> Result<Self> {
        let path = &config.catalog.path;
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = GroundCatalog::from_json_str(&text)
            .with_context(|| format!("invalid catalog {}", path.display()))?;
        info!(path = %path.display(), "loaded ground catalog");
        Ok(Self {
            config,
            catalog: Arc::new(catalog),
        })
    }

    fn read_map(&self, path: &Path) -> Result<MapJson> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read map {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid map {}", path.display()))
    }

    fn build_world(&self, map: &MapJson, port: Box<dyn RenderPort>) -> Result<World> {
        World::from_json(map, self.config.world_config(), Arc::clone(&self.catalog), port)
            .context("failed to rebuild the map")
    }

    fn load_world(&self, path: &Path) -> Result<World> {
        let map = self.read_map(path)?;
        self.build_world(&map, Box::new(NullRenderPort::new()))
            .with_context(|| format!("while loading {}", path.display()))
    }

    /// Loads the map with a scene recorder attached as its render port.
    fn load_recorded_world(&self, path: &Path) -> Result<(World, Rc<RefCell<Scene>>)> {
        let map = self.read_map(path)?;
        let (columns, rows) = map
            .dimensions()
            .context("map rows have different lengths")?;
        let grid = self.config.grid(columns, rows)?;
        let recorder = SceneRecorder::new(grid);
        let scene = recorder.scene();
        let world = self
            .build_world(&map, Box::new(recorder))
            .with_context(|| format!("while loading {}", path.display()))?;
        Ok((world, scene))
    }

    fn write_world(&self, world: &World, path: &Path) -> Result<()> {
        let blob = editor::save(world).context("failed to serialise map")?;
        fs::write(path, blob).with_context(|| format!("failed to write map {}", path.display()))
    }
}

fn parse_cell(value: &str) -> Result<CellCoord, String> {
    let (column, row) = value
        .split_once(',')
        .ok_or_else(|| format!("expected COLUMN,ROW but got '{value}'"))?;
    let column = column
        .trim()
        .parse::<u32>()
        .map_err(|error| format!("bad column '{column}': {error}"))?;
    let row = row
        .trim()
        .parse::<u32>()
        .map_err(|error| format!("bad row '{row}': {error}"))?;
    Ok(CellCoord::new(column, row))
}

fn parse_direction(value: &str) -> Result<Direction, String> {
    Direction::ALL
        .into_iter()
        .find(|direction| direction.as_str() == value.trim())
        .ok_or_else(|| format!("unknown direction '{value}'"))
}

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    Ok(())
}

/// Frames that select `ground` and move the working elevation up to `level`.
fn select_frames(ground: GroundType, layer: EditLayer, level: u32) -> Vec<EditorInput> {
    let mut frames = vec![EditorInput {
        select: Some((ground, layer)),
        ..EditorInput::default()
    }];
    for _ in 1..level {
        frames.push(EditorInput {
            raise: true,
            ..EditorInput::default()
        });
    }
    frames
}

/// Feeds editor frames through the world and stores the map if every edit landed.
fn run_editor(session: &Session, path: &Path, frames: Vec<EditorInput>) -> Result<()> {
    let mut world = session.load_world(path)?;
    let mut editor = Editor::new();
    let mut commands = Vec::new();
    let mut events: Vec<Event> = Vec::new();

    for frame in frames {
        let previous = std::mem::take(&mut events);
        editor.handle(&previous, frame, &mut commands);
        for command in commands.drain(..) {
            apply(&mut world, command, &mut events)
                .context("the catalog lacks a ground the edit needs")?;
        }
    }
    editor.handle(&events, EditorInput::default(), &mut commands);

    if let Some((cell, reason)) = editor.last_rejection() {
        bail!("edit at {cell} rejected: {reason}");
    }
    session.write_world(&world, path)?;
    print!("{}", view::render_ascii(&world));
    Ok(())
}

/// Create a map file filled with one ground
#[derive(Parser, Debug)]
pub(crate) struct New {
    /// Map file to create
    #[arg(long)]
    map: PathBuf,

    /// Number of columns, overriding the config
    #[arg(long)]
    columns: Option<u32>,

    /// Number of rows, overriding the config
    #[arg(long)]
    rows: Option<u32>,

    /// Kind every cell starts with, overriding the config
    #[arg(long)]
    ground: Option<String>,

    /// Replace an existing file
    #[arg(long)]
    force: bool,
}

impl New {
    pub(crate) fn execute(self, session: &Session) -> Result<()> {
        refuse_overwrite(&self.map, self.force)?;
        let defaults = session.config.world_config();
        let default_ground = match self.ground {
            Some(kind) => GroundType::middle(kind),
            None => defaults.default_ground.clone(),
        };
        let config = WorldConfig {
            columns: self.columns.unwrap_or(defaults.columns),
            rows: self.rows.unwrap_or(defaults.rows),
            default_ground,
            ..defaults
        };
        let world = World::new(
            config,
            Arc::clone(&session.catalog),
            Box::new(NullRenderPort::new()),
        )
        .context("the default ground is not in the catalog")?;
        session.write_world(&world, &self.map)?;
        let (columns, rows) = query::dimensions(&world);
        info!(map = %self.map.display(), columns, rows, "created map");
        Ok(())
    }
}

/// Stack a ground on a cell
#[derive(Parser, Debug)]
pub(crate) struct Paint {
    /// Map file to edit
    #[arg(long)]
    map: PathBuf,

    /// Target cell as COLUMN,ROW
    #[arg(long, value_parser = parse_cell)]
    cell: CellCoord,

    /// Ground kind to paint, `erase` to delete instead
    #[arg(long)]
    ground: String,

    /// Elevation level to paint at
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    elevation: u32,
}

impl Paint {
    pub(crate) fn execute(self, session: &Session) -> Result<()> {
        let mut frames = select_frames(
            GroundType::middle(self.ground),
            EditLayer::Stack,
            self.elevation,
        );
        frames.push(EditorInput {
            paint: Some(self.cell),
            ..EditorInput::default()
        });
        run_editor(session, &self.map, frames)
    }
}

/// Repaint the floor of a flat cell without stacking
#[derive(Parser, Debug)]
pub(crate) struct Set {
    /// Map file to edit
    #[arg(long)]
    map: PathBuf,

    /// Target cell as COLUMN,ROW
    #[arg(long, value_parser = parse_cell)]
    cell: CellCoord,

    /// Ground kind to paint
    #[arg(long)]
    ground: String,
}

impl Set {
    pub(crate) fn execute(self, session: &Session) -> Result<()> {
        if self.ground == ERASE_KIND {
            bail!("the floor cannot be erased, use `erase` on stacked grounds");
        }
        let mut frames = select_frames(GroundType::middle(self.ground), EditLayer::Floor, 1);
        frames.push(EditorInput {
            paint: Some(self.cell),
            ..EditorInput::default()
        });
        run_editor(session, &self.map, frames)
    }
}

/// Remove the top ground at an elevation
#[derive(Parser, Debug)]
pub(crate) struct Erase {
    /// Map file to edit
    #[arg(long)]
    map: PathBuf,

    /// Target cell as COLUMN,ROW
    #[arg(long, value_parser = parse_cell)]
    cell: CellCoord,

    /// Elevation level to remove from
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    elevation: u32,
}

impl Erase {
    pub(crate) fn execute(self, session: &Session) -> Result<()> {
        let mut frames = select_frames(
            GroundType::middle(ERASE_KIND),
            EditLayer::Stack,
            self.elevation,
        );
        frames.push(EditorInput {
            erase: Some(self.cell),
            ..EditorInput::default()
        });
        run_editor(session, &self.map, frames)
    }
}

/// Print a map
#[derive(Parser, Debug)]
pub(crate) struct Show {
    /// Map file to print
    #[arg(long)]
    map: PathBuf,

    /// List every recorded visual instead of the cell overview
    #[arg(long)]
    scene: bool,
}

impl Show {
    pub(crate) fn execute(self, session: &Session) -> Result<()> {
        if !self.scene {
            let world = session.load_world(&self.map)?;
            print!("{}", view::render_ascii(&world));
            return Ok(());
        }

        let (_world, scene) = session.load_recorded_world(&self.map)?;
        let scene = scene.borrow();
        let mut backend = TextBackend::new(io::stdout().lock());
        backend.present(&scene)
    }
}

/// Spawn a movable and walk it across the map
#[derive(Parser, Debug)]
pub(crate) struct Walk {
    /// Map file to walk on
    #[arg(long)]
    map: PathBuf,

    /// Starting cell as COLUMN,ROW
    #[arg(long, value_parser = parse_cell)]
    from: CellCoord,

    /// Comma separated steps such as `right,right,down`
    #[arg(long, value_delimiter = ',', value_parser = parse_direction)]
    steps: Vec<Direction>,

    /// Block program such as `repeat 3 [ right down ]`, instead of --steps
    #[arg(long, conflicts_with = "steps")]
    program: Option<String>,

    /// Kind of the walking movable
    #[arg(long, default_value = "knight")]
    kind: String,

    /// Variant of the walking movable
    #[arg(long = "type", default_value = "blue")]
    variant: String,
}

impl Walk {
    pub(crate) fn execute(self, session: &Session) -> Result<()> {
        let program = match &self.program {
            Some(source) => Program::parse(source).context("invalid program")?,
            None => Program::from_steps(self.steps.iter().copied()),
        };
        let (mut world, scene) = session.load_recorded_world(&self.map)?;
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnMovable {
                identity: MovableType::new(self.kind, self.variant),
                cell: self.from,
            },
            &mut events,
        )
        .context("the catalog lacks a ground the spawn needs")?;
        let movable = events
            .iter()
            .find_map(|event| match event {
                Event::MovableSpawned { movable, .. } => Some(*movable),
                _ => None,
            })
            .with_context(|| format!("{} lies outside the map", self.from))?;
        let mut script = Script::new(&program, movable).context("program cannot run")?;

        let transition = query::transition(&world);
        let mut movement = Movement::new();
        let mut intents = Vec::new();
        let mut commands = Vec::new();
        let mut stdout = io::stdout().lock();
        loop {
            let previous = std::mem::take(&mut events);
            intents.clear();
            script.handle(&previous, &mut intents);
            let Some(direction) = intents.first().map(|intent| intent.direction) else {
                break;
            };
            movement.handle(
                &previous,
                &intents,
                |movable, direction| query::can_move(&world, movable, direction),
                &mut commands,
            );
            if commands.is_empty() {
                writeln!(stdout, "{direction}: blocked")?;
                continue;
            }
            for command in commands.drain(..) {
                apply(&mut world, command, &mut events)
                    .context("the catalog lacks a ground the move needs")?;
            }
            apply(&mut world, Command::Tick { dt: transition }, &mut events)
                .context("the catalog lacks a ground the tick needs")?;
            scene.borrow_mut().advance(transition);

            for event in &events {
                if let Event::MovableMoved { to, .. } = event {
                    let position = scene
                        .borrow()
                        .occupants()
                        .next()
                        .map(|(_, occupant)| occupant.position)
                        .unwrap_or_default();
                    writeln!(
                        stdout,
                        "{direction}: {to} at ({:.1}, {:.1})",
                        position.x, position.y
                    )?;
                }
            }
        }
        debug!(movable = movable.get(), "walk finished");
        write!(stdout, "{}", view::render_ascii(&world))?;
        Ok(())
    }
}

/// Print a map as a single-line transfer string
#[derive(Parser, Debug)]
pub(crate) struct Export {
    /// Map file to export
    #[arg(long)]
    map: PathBuf,
}

impl Export {
    pub(crate) fn execute(self, session: &Session) -> Result<()> {
        let map = session.read_map(&self.map)?;
        let code = transfer::encode(&map).context("failed to encode the map")?;
        println!("{code}");
        Ok(())
    }
}

/// Write a map file from a transfer string
#[derive(Parser, Debug)]
pub(crate) struct Import {
    /// Map file to create
    #[arg(long)]
    map: PathBuf,

    /// Transfer string produced by `export`
    #[arg(long)]
    code: String,

    /// Replace an existing file
    #[arg(long)]
    force: bool,
}

impl Import {
    pub(crate) fn execute(self, session: &Session) -> Result<()> {
        refuse_overwrite(&self.map, self.force)?;
        let map = transfer::decode(&self.code).context("invalid transfer string")?;
        let world = session.build_world(&map, Box::new(NullRenderPort::new()))?;
        session.write_world(&world, &self.map)?;
        print!("{}", view::render_ascii(&world));
        Ok(())
    }
}
