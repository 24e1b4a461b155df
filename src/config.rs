use std::path::{Path, PathBuf};

use duct::cmd as duct_cmd;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use which::which;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("the cli option must be an argument list or a shell string: {message}")]
    InvalidCliOption { message: String },

    #[error("node is required to load {path}")]
    NodeMissing { path: PathBuf },

    #[error("node failed to load {path}: {stderr}")]
    NodeLoadFailed { path: PathBuf, stderr: String },
}

/// When to notify or print after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportPolicy {
    Never,
    OnFailure,
    #[default]
    Always,
}

impl ReportPolicy {
    pub fn applies(self, passed: bool) -> bool {
        match self {
            ReportPolicy::Never => false,
            ReportPolicy::OnFailure => !passed,
            ReportPolicy::Always => true,
        }
    }
}

/// Extra arguments forwarded to jest, either pre-split or as one shell string.
/// Any other config value type is rejected at deserialization time.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExtraArgs {
    List(Vec<String>),
    Shell(String),
}

impl ExtraArgs {
    pub fn resolve(&self) -> Result<Vec<String>, ConfigError> {
        match self {
            ExtraArgs::List(args) => Ok(args.clone()),
            ExtraArgs::Shell(raw) => {
                shell_words::split(raw).map_err(|err| ConfigError::InvalidCliOption {
                    message: err.to_string(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JestrelConfig {
    pub command: Option<String>,
    pub cli: Option<ExtraArgs>,
    pub default_paths: Option<Vec<String>>,
    pub notification: Option<ReportPolicy>,
    pub print_result: Option<ReportPolicy>,
    pub all_on_start: Option<bool>,
    pub keep_failed: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub verbose: Option<bool>,
}

pub const DEFAULT_COMMAND: &str = "jest";
pub const DEFAULT_PATHS: [&str; 2] = ["**/*.js", "**/*.es6"];

/// Config with every option resolved, ready to hand to a `Runner`.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub project_root: PathBuf,
    pub command: String,
    pub cli: Option<ExtraArgs>,
    pub default_paths: Vec<String>,
    pub notification: ReportPolicy,
    pub print_result: ReportPolicy,
    pub all_on_start: bool,
    pub keep_failed: bool,
    pub timeout_ms: Option<u64>,
    pub verbose: bool,
}

impl RunSettings {
    pub fn from_config(project_root: &Path, config: &JestrelConfig) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            command: config
                .command
                .clone()
                .unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
            cli: config.cli.clone(),
            default_paths: config
                .default_paths
                .clone()
                .unwrap_or_else(|| DEFAULT_PATHS.iter().map(|s| s.to_string()).collect()),
            notification: config.notification.unwrap_or_default(),
            print_result: config.print_result.unwrap_or_default(),
            all_on_start: config.all_on_start.unwrap_or(false),
            keep_failed: config.keep_failed.unwrap_or(true),
            timeout_ms: config.timeout_ms,
            verbose: config.verbose.unwrap_or(false),
        }
    }

    pub fn resolve_cli_args(&self) -> Result<Vec<String>, ConfigError> {
        self.cli
            .as_ref()
            .map(ExtraArgs::resolve)
            .transpose()
            .map(|args| args.unwrap_or_default())
    }
}

/// Nearest ancestor carrying a package.json wins; a git checkout without one
/// falls back to the repository workdir, then to the starting directory.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut dir = start;
    loop {
        if dir.join("package.json").exists() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
    git2::Repository::discover(start)
        .ok()
        .and_then(|repo| repo.workdir().map(Path::to_path_buf))
        .unwrap_or_else(|| start.to_path_buf())
}

pub fn discover_config_path(project_root: &Path) -> Option<PathBuf> {
    let names = [
        "jestrel.toml",
        "jestrel.config.json",
        "jestrel.config.json5",
        "jestrel.config.jsonc",
        "jestrel.config.yaml",
        "jestrel.config.yml",
        "jestrel.config.js",
        "jestrel.config.cjs",
        "jestrel.config.mjs",
        ".jestrelrc",
        ".jestrelrc.json",
        ".jestrelrc.json5",
        ".jestrelrc.yaml",
        ".jestrelrc.yml",
        ".jestrelrc.js",
        ".jestrelrc.cjs",
        ".jestrelrc.mjs",
    ];
    names
        .into_iter()
        .map(|name| project_root.join(name))
        .find(|p| p.exists())
}

pub fn load_config(project_root: &Path) -> Result<JestrelConfig, ConfigError> {
    if let Some(path) = discover_config_path(project_root) {
        return load_config_from_path(&path);
    }

    load_package_json_config(project_root)
}

pub fn load_config_from_path(path: &Path) -> Result<JestrelConfig, ConfigError> {
    let ext = path
        .extension()
        .and_then(|x| x.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        // a bare `.jestrelrc` is json
        "json" | "json5" | "jsonc" | "" => load_json_config(path),
        "yaml" | "yml" => load_yaml_config(path),
        "toml" => load_toml_config(path),
        "js" | "cjs" | "mjs" => load_js_config(path),
        _ => Ok(JestrelConfig::default()),
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_json_config(path: &Path) -> Result<JestrelConfig, ConfigError> {
    let raw = read_config_file(path)?;
    json5::from_str::<JestrelConfig>(&raw)
        .or_else(|_| serde_json::from_str::<JestrelConfig>(&raw))
        .map_err(|err| ConfigError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

fn load_yaml_config(path: &Path) -> Result<JestrelConfig, ConfigError> {
    let raw = read_config_file(path)?;
    serde_yaml::from_str::<JestrelConfig>(&raw).map_err(|err| ConfigError::ConfigParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn load_toml_config(path: &Path) -> Result<JestrelConfig, ConfigError> {
    let raw = read_config_file(path)?;
    let toml_value =
        toml::from_str::<toml::Value>(&raw).map_err(|err| ConfigError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    let json_value = serde_json::to_value(toml_value).map_err(|err| ConfigError::ConfigParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let normalized = camel_case_keys(&json_value);

    serde_json::from_value::<JestrelConfig>(normalized).map_err(|err| ConfigError::ConfigParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn load_package_json_config(project_root: &Path) -> Result<JestrelConfig, ConfigError> {
    let path = project_root.join("package.json");
    if !path.exists() {
        return Ok(JestrelConfig::default());
    }

    let raw = read_config_file(&path)?;
    let manifest =
        serde_json::from_str::<JsonValue>(&raw).map_err(|err| ConfigError::ConfigParse {
            path: path.clone(),
            message: err.to_string(),
        })?;

    match manifest.get("jestrel") {
        Some(section) => serde_json::from_value::<JestrelConfig>(section.clone()).map_err(|err| {
            ConfigError::ConfigParse {
                path,
                message: err.to_string(),
            }
        }),
        None => Ok(JestrelConfig::default()),
    }
}

// TOML config files are written snake_case; the serde model is camelCase.
fn camel_case_keys(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(object) => JsonValue::Object(
            object
                .iter()
                .map(|(key, value)| (camel_case_key(key), camel_case_keys(value)))
                .collect(),
        ),
        JsonValue::Array(array) => JsonValue::Array(array.iter().map(camel_case_keys).collect()),
        other => other.clone(),
    }
}

fn camel_case_key(key: &str) -> String {
    if !key.contains('_') {
        return key.to_string();
    }

    let mut segments = key.split('_').filter(|segment| !segment.is_empty());
    let Some(first_segment) = segments.next() else {
        return key.to_string();
    };

    segments.fold(String::from(first_segment), |mut out, segment| {
        let mut chars = segment.chars();
        if let Some(head) = chars.next() {
            out.push(head.to_ascii_uppercase());
            out.extend(chars);
        }
        out
    })
}

fn load_js_config(path: &Path) -> Result<JestrelConfig, ConfigError> {
    let node = which("node").map_err(|_| ConfigError::NodeMissing {
        path: path.to_path_buf(),
    })?;

    let script = r#"
import { pathToFileURL } from 'node:url';
import { createRequire } from 'node:module';

const p = process.argv[1];

let mod;
try {
  mod = await import(pathToFileURL(p).href);
} catch {
  mod = createRequire(import.meta.url)(p);
}

const cfg = mod && (mod.default ?? mod);
process.stdout.write(JSON.stringify(cfg ?? {}));
"#;

    let out = duct_cmd(
        &node,
        ["--input-type=module", "-e", script, &path.to_string_lossy()],
    )
    .stdout_capture()
    .stderr_capture()
    .unchecked()
    .run()
    .map_err(|err| ConfigError::ConfigParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    if !out.status.success() {
        let mut stderr = String::from_utf8_lossy(&out.stderr).to_string();
        if stderr.trim().is_empty() {
            stderr = format!("exit_code={:?}", out.status.code());
        }
        return Err(ConfigError::NodeLoadFailed {
            path: path.to_path_buf(),
            stderr,
        });
    }

    serde_json::from_slice::<JestrelConfig>(&out.stdout).map_err(|err| {
        ConfigError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    })
}
