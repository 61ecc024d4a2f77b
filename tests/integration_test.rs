//! Integration tests for lodgen.
//!
//! Exercises the full CLI pipeline: generate a plain-text OBJ cube, run
//! `lodgen generate` against it, and verify the output layout matches §6.4.

use std::path::Path;
use tempfile::tempdir;

const CUBE_OBJ: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
v 0.0 0.0 1.0
v 1.0 0.0 1.0
v 1.0 1.0 1.0
v 0.0 1.0 1.0
f 1 2 3
f 1 3 4
f 5 7 6
f 5 8 7
f 1 5 6
f 1 6 2
f 4 3 7
f 4 7 8
f 1 4 8
f 1 8 5
f 2 6 7
f 2 7 3
";

fn lodgen_generate(input: &Path, output: &Path, ratio: &str) {
    let status = std::process::Command::new(env!("CARGO_BIN_EXE_lodgen"))
        .args([
            "generate",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-r",
            ratio,
        ])
        .status()
        .expect("failed to run lodgen");
    assert!(status.success(), "lodgen generate failed");
}

#[test]
fn cube_single_ratio_produces_expected_layout() {
    let dir = tempdir().expect("failed to create temp dir");
    let obj_path = dir.path().join("cube.obj");
    std::fs::write(&obj_path, CUBE_OBJ).expect("failed to write test OBJ");

    let out_dir = dir.path().join("out");
    lodgen_generate(&obj_path, &out_dir, "0.5");

    let lod1 = out_dir.join("lod1").join("cube_lod1.obj");
    assert!(lod1.exists(), "expected {:?} to exist", lod1);
}

#[test]
fn multiple_ratios_produce_one_directory_each() {
    let dir = tempdir().expect("failed to create temp dir");
    let obj_path = dir.path().join("cube.obj");
    std::fs::write(&obj_path, CUBE_OBJ).expect("failed to write test OBJ");

    let out_dir = dir.path().join("out");
    let status = std::process::Command::new(env!("CARGO_BIN_EXE_lodgen"))
        .args([
            "generate",
            obj_path.to_str().unwrap(),
            "-o",
            out_dir.to_str().unwrap(),
            "-r",
            "0.5",
            "-r",
            "0.25",
        ])
        .status()
        .expect("failed to run lodgen");
    assert!(status.success());

    assert!(out_dir.join("lod1").join("cube_lod1.obj").exists());
    assert!(out_dir.join("lod2").join("cube_lod2.obj").exists());
}

#[test]
fn formats_subcommand_lists_obj() {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_lodgen"))
        .arg("formats")
        .output()
        .expect("failed to run lodgen formats");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|l| l.trim() == "obj"));
}
