use assert_cmd::Command;
use std::fs;
use tempfile::tempdir;

#[test]
#[allow(deprecated)]
fn test_config_load_swallows_parse_error() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");

    // Would enable verbose mode if it parsed.
    let invalid_toml = r#"
[general]
verbose = true
color = "never"
invalid_syntax_here =
"#;
    fs::write(&config_path, invalid_toml).expect("failed to write config file");

    let mut cmd = Command::cargo_bin("erg").expect("failed to find binary");
    cmd.env_clear()
        .env("HOME", temp_dir.path())
        .env("XDG_CONFIG_HOME", temp_dir.path().join("xdg"))
        .env("ERG_CONFIG", &config_path)
        .current_dir(temp_dir.path())
        .arg("config");

    // The broken file is reported and ignored; defaults stay in effect.
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Verbose: false"))
        .stdout(predicates::str::contains("ignored"));
}

#[test]
#[allow(deprecated)]
fn test_verbose_config_from_file_is_applied() {
    let temp_dir = tempdir().expect("failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[general]\nverbose = true\n").expect("failed to write config file");

    let mut cmd = Command::cargo_bin("erg").expect("failed to find binary");
    cmd.env_clear()
        .env("HOME", temp_dir.path())
        .env("XDG_CONFIG_HOME", temp_dir.path().join("xdg"))
        .env("ERG_CONFIG", &config_path)
        .current_dir(temp_dir.path())
        .arg("config");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Verbose: true"))
        .stdout(predicates::str::contains("loaded"));
}
