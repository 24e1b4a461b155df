use std::path::Path;

use crate::config::{ExtraArgs, JestrelConfig, RunSettings};
use crate::runner::{RunError, Runner};

fn settings_with(cli: Option<ExtraArgs>) -> RunSettings {
    let config = JestrelConfig {
        cli,
        ..JestrelConfig::default()
    };
    RunSettings::from_config(Path::new("/no-such-project"), &config)
}

fn command_for(cli: Option<ExtraArgs>, paths: &[&str]) -> Vec<String> {
    let paths = paths.iter().map(|p| p.to_string()).collect::<Vec<_>>();
    Runner::new(settings_with(cli))
        .command_for_check(Path::new("/tmp/jestrel-out.json"), &paths)
        .unwrap()
}

#[test]
fn command_ends_with_paths_in_original_order() {
    let argv = command_for(None, &["b.test.js", "a.test.js"]);
    assert_eq!(argv[argv.len() - 2..], ["b.test.js", "a.test.js"]);
}

#[test]
fn command_always_carries_json_colors_and_output_file() {
    let argv = command_for(None, &["a.test.js"]);
    assert!(argv.contains(&"--json".to_string()));
    assert!(argv.contains(&"--colors".to_string()));
    assert!(argv.iter().any(|t| t.starts_with("--outputFile=")));
}

#[test]
fn empty_paths_fall_back_to_configured_default_paths() {
    let argv = command_for(None, &[]);
    assert_eq!(argv[argv.len() - 2..], ["**/*.js", "**/*.es6"]);
}

#[test]
fn shell_string_cli_args_split_into_tokens_right_after_command() {
    let argv = command_for(
        Some(ExtraArgs::Shell("--coverage --verbose".to_string())),
        &["a.test.js"],
    );
    assert_eq!(argv[1], "--coverage");
    assert_eq!(argv[2], "--verbose");
    assert_eq!(argv[3], "--json");
}

#[test]
fn list_cli_args_are_not_resplit() {
    let argv = command_for(
        Some(ExtraArgs::List(vec!["--coverage --verbose".to_string()])),
        &["a.test.js"],
    );
    assert_eq!(argv[1], "--coverage --verbose");
}

#[test]
fn bad_shell_string_fails_before_any_launch() {
    let err = Runner::new(settings_with(Some(ExtraArgs::Shell(
        "--filter 'unterminated".to_string(),
    ))))
    .command_for_check(Path::new("/tmp/jestrel-out.json"), &[])
    .unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
}

#[test]
fn bare_command_without_local_bin_stays_bare() {
    let argv = command_for(None, &[]);
    assert_eq!(argv[0], "jest");
}
