use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

const CATALOG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets/ground.json");

struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("highland-cli-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("temp dir is writable");
        fs::write(
            dir.join("highland.toml"),
            format!("[catalog]\npath = '{CATALOG}'\n\n[map]\ncolumns = 4\nrows = 3\n"),
        )
        .expect("config is writable");
        Self { dir }
    }

    fn map(&self) -> PathBuf {
        self.dir.join("map.json")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_highland"))
            .current_dir(&self.dir)
            .args(args)
            .output()
            .expect("binary runs")
    }

    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).expect("stdout is utf-8")
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn path(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

#[test]
fn painted_maps_are_saved_and_shown() {
    let workspace = Workspace::new("paint");
    let map = workspace.map();
    let _ = workspace.ok(&["new", "--map", path(&map)]);
    assert_eq!(
        workspace.ok(&["show", "--map", path(&map)]),
        "~1 ~1 ~1 ~1\n~1 ~1 ~1 ~1\n~1 ~1 ~1 ~1\n"
    );

    let painted = workspace.ok(&[
        "paint", "--map", path(&map), "--cell", "1,0", "--ground", "grass", "--elevation", "2",
    ]);
    assert_eq!(painted, "~1 g2 ~1 ~1\n~1 r' ~1 ~1\n~1 ~1 ~1 ~1\n");
    assert_eq!(
        workspace.ok(&["show", "--map", path(&map)]),
        painted,
        "the edit is written back to the file"
    );

    let saved = fs::read_to_string(&map).expect("map exists");
    assert!(saved.contains("\"kind\":\"grass\""), "saved as map json: {saved}");
}

#[test]
fn rejected_edits_leave_the_file_alone() {
    let workspace = Workspace::new("reject");
    let map = workspace.map();
    let _ = workspace.ok(&["new", "--map", path(&map)]);
    let before = fs::read_to_string(&map).expect("map exists");

    let output = workspace.run(&["erase", "--map", path(&map), "--cell", "0,0"]);
    assert!(!output.status.success(), "the only ground of a cell stays");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rejected"), "reason is reported: {stderr}");
    assert_eq!(fs::read_to_string(&map).expect("map exists"), before);
}

#[test]
fn existing_maps_are_not_overwritten_without_force() {
    let workspace = Workspace::new("force");
    let map = workspace.map();
    let _ = workspace.ok(&["new", "--map", path(&map)]);
    assert!(!workspace.run(&["new", "--map", path(&map)]).status.success());
    let _ = workspace.ok(&["new", "--map", path(&map), "--ground", "grass", "--force"]);
    assert!(workspace
        .ok(&["show", "--map", path(&map)])
        .starts_with("g1 g1"));
}

#[test]
fn transfer_strings_recreate_the_map() {
    let workspace = Workspace::new("transfer");
    let map = workspace.map();
    let copy = workspace.dir.join("copy.json");
    let _ = workspace.ok(&["new", "--map", path(&map)]);
    let _ = workspace.ok(&[
        "paint", "--map", path(&map), "--cell", "2,2", "--ground", "sand",
    ]);

    let code = workspace.ok(&["export", "--map", path(&map)]);
    assert!(code.starts_with("highland:v1:4x3:"), "unexpected code {code}");
    let _ = workspace.ok(&["import", "--map", path(&copy), "--code", code.trim()]);

    assert_eq!(
        workspace.ok(&["show", "--map", path(&copy)]),
        workspace.ok(&["show", "--map", path(&map)])
    );
}

#[test]
fn walkers_stop_at_the_edge_of_the_map() {
    let workspace = Workspace::new("walk");
    let map = workspace.map();
    let _ = workspace.ok(&[
        "new", "--map", path(&map), "--columns", "3", "--rows", "1", "--ground", "grass",
    ]);

    let walked = workspace.ok(&[
        "walk", "--map", path(&map), "--from", "0,0", "--steps", "right,right,right",
    ]);
    let lines: Vec<&str> = walked.lines().collect();
    assert!(lines[0].starts_with("right: (1, 0) at"), "{walked}");
    assert!(lines[1].starts_with("right: (2, 0) at"), "{walked}");
    assert_eq!(lines[2], "right: blocked");
    assert_eq!(lines[3], "g1 g1 G1");
}

#[test]
fn scene_listing_names_every_sprite() {
    let workspace = Workspace::new("scene");
    let map = workspace.map();
    let _ = workspace.ok(&["new", "--map", path(&map), "--columns", "2", "--rows", "1"]);

    let listing = workspace.ok(&["show", "--map", path(&map), "--scene"]);
    let grounds = listing
        .lines()
        .filter(|line| line.starts_with("ground"))
        .count();
    assert_eq!(grounds, 2, "{listing}");
    assert!(listing.contains("ground/water-middle"), "{listing}");
}

#[test]
fn block_programs_drive_the_walker() {
    let workspace = Workspace::new("program");
    let map = workspace.map();
    let _ = workspace.ok(&[
        "new", "--map", path(&map), "--columns", "3", "--rows", "1", "--ground", "grass",
    ]);

    let walked = workspace.ok(&[
        "walk", "--map", path(&map), "--from", "0,0", "--program", "repeat 2 [ right ]",
    ]);
    let lines: Vec<&str> = walked.lines().collect();
    assert!(lines[0].starts_with("right: (1, 0) at"), "{walked}");
    assert!(lines[1].starts_with("right: (2, 0) at"), "{walked}");
    assert_eq!(lines[2], "g1 g1 G1");

    let output = workspace.run(&[
        "walk", "--map", path(&map), "--from", "0,0", "--program", "repeat 2 [ right",
    ]);
    assert!(!output.status.success(), "unclosed bodies are refused");
}
