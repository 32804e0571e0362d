use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

const PORTRAIT: &str = r#"
version = 1
format = "rgba8"

[[steps]]
effect = "brightness_contrast"
brightness = 0.1
contrast = 0.2

[[steps]]
effect = "gaussian"
size = 7
sigma = 1.5

[[steps]]
effect = "comic"

[[steps]]
effect = "vignette"
amount = 2.5
"#;

fn lumactl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lumactl"))
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run lumactl")
}

fn write_recipe(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn effects_json_lists_the_catalogue() {
    let output = lumactl(&["effects", "--json"]);
    assert!(output.status.success());

    let effects: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let effects = effects.as_array().unwrap();
    assert_eq!(effects.len(), 41);

    let vignette = effects
        .iter()
        .find(|effect| effect["name"] == "vignette")
        .expect("vignette listed");
    assert_eq!(vignette["group"], "adjust");
    let amount = vignette["params"]
        .as_array()
        .unwrap()
        .iter()
        .find(|param| param["name"] == "amount")
        .unwrap();
    assert_eq!(amount["min"], -1.0);
    assert_eq!(amount["max"], 1.0);
    assert_eq!(amount["default"], 0.5);
}

#[test]
fn check_accepts_a_valid_recipe_and_warns_about_clamping() {
    let dir = TempDir::new().unwrap();
    let recipe = write_recipe(&dir, "portrait.toml", PORTRAIT);

    let output = lumactl(&["check", recipe.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "{stderr}");
    assert!(stdout.contains("ok (4 steps"), "{stdout}");
    assert!(stderr.contains("amount = 2.5"), "{stderr}");
}

#[test]
fn check_rejects_structural_errors() {
    let dir = TempDir::new().unwrap();
    let recipe = write_recipe(
        &dir,
        "bad.toml",
        "version = 1\n[[steps]]\neffect = \"matrix_warp\"\nmatrix = [1.0, 0.0, 0.0]\n",
    );

    let output = lumactl(&["check", recipe.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("matrix needs 4 or 9 values"), "{stderr}");
}

#[test]
fn check_reports_missing_files() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let output = lumactl(&["check", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read recipe"));
}

#[test]
fn kernel_prints_weights_and_glsl() {
    let output = lumactl(&["kernel", "--size", "5", "--sigma", "1", "--axis", "vertical"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# key: gaussian[vertical/5x"), "{stdout}");
    assert_eq!(stdout.lines().filter(|line| line.contains("sum += ")).count(), 5);
    assert!(stdout.contains("vec2(0.0, -2.0)"), "{stdout}");
}

#[test]
fn kernel_rejects_bad_sigma() {
    let output = lumactl(&["kernel", "--sigma", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("sigma must be a positive number"));
}

#[test]
fn run_prints_channel_statistics() {
    let dir = TempDir::new().unwrap();
    let recipe = write_recipe(&dir, "portrait.toml", PORTRAIT);

    let output = lumactl(&["run", recipe.to_str().unwrap(), "--size", "48x32"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() && stderr.contains("failed to initialise the GPU") {
        eprintln!("skipping run_prints_channel_statistics: no adapter");
        return;
    }
    assert!(output.status.success(), "{stderr}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("48x32 rgba8 in "), "{stdout}");
    for channel in ["r", "g", "b", "a"] {
        assert!(
            stdout.lines().any(|line| line.trim_start().starts_with(&format!("{channel}  mean"))),
            "{stdout}"
        );
    }
}
