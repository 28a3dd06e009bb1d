//! CLI tests for `loopfuse init` and `loopfuse run`.
//!
//! Spawns the loopfuse binary in a temp directory and verifies stdout JSON and
//! exit codes for successful kernels and rejected loop bodies.

use std::fs;
use std::process::{Command, Output};

use loopfuse::exit_codes;
use loopfuse::io::config::{EngineConfig, LoopfuseConfig, load_config, write_config};
use serde_json::Value;

fn loopfuse(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_loopfuse"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn loopfuse")
}

fn result_of(output: &Output) -> Vec<f64> {
    let json: Value = serde_json::from_slice(&output.stdout).expect("stdout json");
    json["result"]
        .as_array()
        .expect("result array")
        .iter()
        .map(|value| value.as_f64().expect("number"))
        .collect()
}

#[test]
fn init_writes_default_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = loopfuse(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let cfg = load_config(&temp.path().join("loopfuse.toml")).expect("load");
    assert_eq!(cfg, LoopfuseConfig::default());
}

#[test]
fn init_keeps_existing_config_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("loopfuse.toml");
    fs::write(&path, "[engine]\nmax_pending_ops = 7\n").expect("write");

    let output = loopfuse(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load").engine.max_pending_ops, 7);

    let output = loopfuse(temp.path(), &["init", "--force"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load"), LoopfuseConfig::default());
}

#[test]
fn run_increment_prints_result() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = loopfuse(
        temp.path(),
        &["run", "increment", "--len", "3", "--niters", "5"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(result_of(&output), vec![5.0, 5.0, 5.0]);

    let json: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["kernel"], "increment");
    assert_eq!(json["stats"]["iterations_executed"], 5);
}

#[test]
fn run_converge_stops_on_condition() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = loopfuse(temp.path(), &["run", "converge", "--limit", "10"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(result_of(&output), vec![3.0; 4]);
}

#[test]
fn run_stencil_slides_the_window() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = loopfuse(
        temp.path(),
        &["run", "stencil", "--len", "5", "--window", "2"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(result_of(&output), vec![1.0, 3.0, 5.0, 7.0]);
}

#[test]
fn read_inside_body_exits_unsupported() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = loopfuse(temp.path(), &["run", "increment", "--force-read"]);
    assert_eq!(output.status.code(), Some(exit_codes::UNSUPPORTED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported loop body"), "stderr: {stderr}");
}

#[test]
fn small_queue_limit_makes_stencil_too_big_to_fuse() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(
        &temp.path().join("loopfuse.toml"),
        &LoopfuseConfig {
            engine: EngineConfig { max_pending_ops: 1 },
        },
    )
    .expect("write config");

    let output = loopfuse(temp.path(), &["run", "stencil"]);
    assert_eq!(output.status.code(), Some(exit_codes::UNSUPPORTED));
}

#[test]
fn invalid_config_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("loopfuse.toml"),
        "[engine]\nmax_pending_ops = 0\n",
    )
    .expect("write");

    let output = loopfuse(temp.path(), &["run", "increment"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}
