//! Runs the `montage` binary in a scratch working directory.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn montage(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_montage"))
        .current_dir(cwd)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn gen_config_needs_no_valid_config() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("config.toml"), "bogus_key = 1\n").unwrap();

    let out = montage(tmp.path(), &["gen-config"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("[storage]"));
    assert!(text.contains("./config.toml"));
}

#[test]
fn config_is_read_from_working_directory() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("config.toml"), "bogus_key = 1\n").unwrap();

    let out = montage(tmp.path(), &["whoami"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("bogus_key"));
}

#[test]
fn configured_data_dir_holds_the_session() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("config.toml"),
        "[storage]\ndata_dir = \"albums\"\n",
    )
    .unwrap();

    let out = montage(tmp.path(), &["login", "ana@example.com", "--password", "pw"]);
    assert!(out.status.success());
    assert!(tmp.path().join("albums").is_dir());

    let out = montage(tmp.path(), &["whoami"]);
    assert_eq!(stdout(&out).trim(), "ana@example.com");

    let out = montage(tmp.path(), &["--data-dir", "elsewhere", "whoami"]);
    assert_eq!(stdout(&out).trim(), "Not signed in");
}
