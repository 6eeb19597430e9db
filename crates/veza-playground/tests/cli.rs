use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

const RUN_REPORT_SCHEMA_VERSION: &str = "veza.playground.run@0.1.0";

/// Minimal guest implementing the playground ABI: bump allocator, fixed
/// context handle, `interpret` echoes the submission.
fn echo_guest() -> Vec<u8> {
    wat::parse_str(
        r#"
(module
  (import "env" "writeOut" (func $write_out (param i32 i32)))
  (import "env" "now" (func $now (result f64)))
  (memory (export "memory") 1)
  (global $bump (mut i32) (i32.const 16))
  (func (export "alloc") (param $n i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $bump))
    (global.set $bump (i32.add (global.get $bump) (local.get $n)))
    (local.get $ptr))
  (func (export "dealloc") (param i32 i32))
  (func (export "createVM") (result i32) (i32.const 1))
  (func (export "interpret") (param $vm i32) (param $ptr i32) (param $len i32)
    (call $write_out (local.get $ptr) (local.get $len))))
"#,
    )
    .expect("fixture wat compiles")
}

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("veza-playground-{test}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn run_playground(args: &[&str]) -> std::process::Output {
    let exe = env!("CARGO_BIN_EXE_veza-playground");
    Command::new(exe)
        .args(args)
        .env_remove("VEZA_PLAYGROUND_MODULE")
        .output()
        .expect("run veza-playground")
}

#[test]
fn run_json_reports_the_echoed_output() {
    let dir = scratch_dir("run-json");
    let module = dir.join("veza.wasm");
    let source = dir.join("program.veza");
    std::fs::write(&module, echo_guest()).expect("write module");
    std::fs::write(&source, "vypis(1 + 2)").expect("write source");

    let out = run_playground(&[
        "run",
        "--module",
        module.to_str().unwrap(),
        "--json",
        source.to_str().unwrap(),
    ]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );

    let report: Value = serde_json::from_slice(&out.stdout).expect("parse stdout JSON");
    assert_eq!(report["schema_version"], RUN_REPORT_SCHEMA_VERSION);
    assert_eq!(report["ok"], true);
    assert_eq!(report["output"], "vypis(1 + 2)");
    assert!(report.get("error").is_none());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_streams_output_without_json() {
    let dir = scratch_dir("run-plain");
    let module = dir.join("veza.wasm");
    let source = dir.join("program.veza");
    std::fs::write(&module, echo_guest()).expect("write module");
    std::fs::write(&source, "vypis(42)").expect("write source");

    let out = run_playground(&["run", "--module", module.to_str().unwrap(), source.to_str().unwrap()]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&out.stdout), "vypis(42)");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_module_flag_is_a_clear_error() {
    let dir = scratch_dir("no-module");
    let source = dir.join("program.veza");
    std::fs::write(&source, "vypis(1)").expect("write source");

    let out = run_playground(&["run", source.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("VEZA_PLAYGROUND_MODULE"),
        "stderr:\n{stderr}"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn digest_mismatch_fails_before_any_run() {
    let dir = scratch_dir("digest");
    let module = dir.join("veza.wasm");
    let source = dir.join("program.veza");
    std::fs::write(&module, echo_guest()).expect("write module");
    std::fs::write(&source, "vypis(1)").expect("write source");

    let out = run_playground(&[
        "run",
        "--module",
        module.to_str().unwrap(),
        "--expect-sha256",
        &"0".repeat(64),
        source.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("sha256 mismatch"), "stderr:\n{stderr}");
    assert!(out.stdout.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}
