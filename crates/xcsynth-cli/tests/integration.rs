//! Integration tests for xcsynth

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[cfg(unix)]
const EXECUTABLE_NAME: &str = "xcsynth";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "xcsynth.exe";

/// A throwaway app project plus a private home for the log file
struct ProjectHarness {
    _home: TempDir,
    home_path: PathBuf,
    _work: TempDir,
    root: PathBuf,
}

impl ProjectHarness {
    fn new() -> io::Result<Self> {
        let home = TempDir::new()?;
        let work = TempDir::new()?;
        let root = work.path().join("Echo");
        for rel in [
            "Echo/EchoApp.swift",
            "Echo/ContentView.swift",
            "Echo/Info.plist",
            "Echo/Assets.xcassets/Contents.json",
            "Echo/Services/Player.swift",
        ] {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, "")?;
        }
        Ok(ProjectHarness {
            home_path: home.path().to_path_buf(),
            _home: home,
            _work: work,
            root,
        })
    }

    fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("xcsynth");
        cmd.env("HOME", &self.home_path)
            .env_remove("XCSYNTH_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, subcommand: &str) -> Command {
        let mut cmd = self.command();
        cmd.arg(subcommand).arg(&self.root);
        cmd
    }

    fn document(&self) -> PathBuf {
        self.root.join("Echo.xcodeproj").join("project.pbxproj")
    }

    fn read_document(&self) -> String {
        fs::read_to_string(self.document()).expect("document should exist")
    }

    fn touch(&self, rel: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, "").expect("write file");
    }
}

/// Point the first build file at an identifier nothing declares
fn break_first_build_file(text: &str) -> String {
    let line = text
        .lines()
        .find(|l| l.contains("isa = PBXBuildFile"))
        .expect("document has a build file");
    let start = line.find("fileRef = ").expect("build file has a fileRef") + "fileRef = ".len();
    let id = &line[start..start + 24];
    let broken = line.replacen(id, "000000000000000000000000", 1);
    text.replacen(line, &broken, 1)
}

fn write_config(root: &Path, body: &str) {
    fs::write(root.join("xcsynth.toml"), body).expect("write config");
}

#[test]
fn test_version() {
    cargo_bin_cmd!("xcsynth")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("xcsynth"));
}

#[test]
fn test_help() {
    cargo_bin_cmd!("xcsynth")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("in step with the files on disk"));
    cargo_bin_cmd!("xcsynth")
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Xcode project synthesizer"));
}

#[test]
fn test_generate_help() {
    cargo_bin_cmd!("xcsynth")
        .args(["generate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Usage: {} generate",
            EXECUTABLE_NAME
        )));
}

#[test]
fn test_invalid_command() {
    cargo_bin_cmd!("xcsynth").arg("invalid").assert().failure();
}

#[test]
fn test_generate_then_verify() {
    let env = ProjectHarness::new().expect("project harness");
    env.run("generate").assert().success();

    let text = env.read_document();
    assert!(text.starts_with("// !$*UTF8*$!\n"));
    assert!(text.contains("/* EchoApp.swift in Sources */"));
    assert!(text.contains("/* Assets.xcassets in Resources */"));
    assert!(text.contains("path = Echo/Info.plist;"));
    assert!(!text.contains("Contents.json"));

    env.run("verify")
        .assert()
        .success()
        .stderr(predicate::str::contains("is consistent"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let env = ProjectHarness::new().expect("project harness");
    env.command()
        .args(["generate", "--dry-run", "--seed", "7"])
        .arg(&env.root)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("// !$*UTF8*$!"))
        .stdout(predicate::str::contains("Player.swift"));
    assert!(!env.root.join("Echo.xcodeproj").exists());
}

#[test]
fn test_seeded_generate_is_reproducible() {
    let env = ProjectHarness::new().expect("project harness");
    env.command()
        .args(["generate", "--seed", "42"])
        .arg(&env.root)
        .assert()
        .success();
    let first = env.read_document();

    env.command()
        .args(["generate", "--seed", "42"])
        .arg(&env.root)
        .assert()
        .success()
        .stderr(predicate::str::contains("is up to date"));
    assert_eq!(env.read_document(), first);
    assert!(!env.root.join("Echo.xcodeproj/project.pbxproj.backup").exists());
}

#[test]
fn test_patch_adds_and_removes_files() {
    let env = ProjectHarness::new().expect("project harness");
    env.run("generate").assert().success();
    let before = env.read_document();

    env.touch("Echo/Services/Recorder.swift");
    fs::remove_file(env.root.join("Echo/ContentView.swift")).expect("remove file");
    env.run("patch").assert().success();

    let after = env.read_document();
    assert!(after.contains("/* Recorder.swift in Sources */"));
    assert!(!after.contains("ContentView.swift"));
    let backup = fs::read_to_string(env.root.join("Echo.xcodeproj/project.pbxproj.backup"))
        .expect("backup should exist");
    assert_eq!(backup, before);

    env.run("verify").assert().success();
}

#[test]
fn test_patch_without_document_generates() {
    let env = ProjectHarness::new().expect("project harness");
    env.run("patch").assert().success();
    assert!(env.document().exists());
    env.run("verify").assert().success();
}

#[test]
fn test_patch_repairs_dangling_build_file() {
    let env = ProjectHarness::new().expect("project harness");
    env.run("generate").assert().success();
    let broken = break_first_build_file(&env.read_document());
    fs::write(env.document(), broken).expect("write broken document");

    env.run("verify")
        .assert()
        .failure()
        .stderr(predicate::str::contains("I1"));

    env.run("patch")
        .assert()
        .success()
        .stderr(predicate::str::contains("repaired"));
    env.run("verify").assert().success();
}

#[test]
fn test_verify_json_names_the_invariant() {
    let env = ProjectHarness::new().expect("project harness");
    env.run("generate").assert().success();
    let broken = break_first_build_file(&env.read_document());
    fs::write(env.document(), broken).expect("write broken document");

    env.command()
        .args(["verify", "--json"])
        .arg(&env.root)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"invariant\": \"I1\""));
}

#[test]
fn test_verify_never_writes() {
    let env = ProjectHarness::new().expect("project harness");
    env.run("verify")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No project document"));
    assert!(!env.root.join("Echo.xcodeproj").exists());
}

#[test]
fn test_list_shows_plan() {
    let env = ProjectHarness::new().expect("project harness");
    env.touch("Echo/README.md");
    env.run("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Echo/Services/Player.swift"))
        .stdout(predicate::str::contains("sourcecode.swift"))
        .stdout(predicate::str::contains("folder.assetcatalog"))
        .stdout(predicate::str::contains("README.md").not());
}

#[test]
fn test_layout_rules_from_config() {
    let env = ProjectHarness::new().expect("project harness");
    write_config(
        &env.root,
        "[[layout.rules]]\nprefix = \"Echo/Services\"\ngroup = \"Audio\"\n",
    );
    env.command()
        .args(["list", "--json"])
        .arg(&env.root)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Audio\""));
}

#[test]
fn test_bad_config_fails() {
    let env = ProjectHarness::new().expect("project harness");
    write_config(&env.root, "project_name = [");
    env.run("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("xcsynth.toml"));
}

#[test]
fn test_config_path() {
    let env = ProjectHarness::new().expect("project harness");
    env.command()
        .args(["config", "path"])
        .arg(&env.root)
        .assert()
        .success()
        .stdout(predicate::str::contains("xcsynth.toml"));
}

#[test]
fn test_config_show() {
    let env = ProjectHarness::new().expect("project harness");
    env.command()
        .args(["config", "show"])
        .arg(&env.root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration:"))
        .stdout(predicate::str::contains("[scan]"));
}
