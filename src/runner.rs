use std::cell::OnceCell;
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::{ConfigError, RunSettings};
use crate::format::summary_text;
use crate::notify::{DesktopNotifier, Notification, NotificationSink, NotifyImage};
use crate::process::run_command_capture;
use crate::test_model::JestRunSummary;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to launch `{command}`: {source}")]
    LaunchFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait on process: {0}")]
    WaitFailed(std::io::Error),

    #[error("command timed out after {timeout_ms}ms: {command}")]
    TimedOut { command: String, timeout_ms: u64 },

    #[error("io error: {0}")]
    Io(std::io::Error),

    #[error("jest result file unreadable ({message}); output from jest was:\n{stderr}\n{stdout}")]
    ResultUnreadable {
        message: String,
        stderr: String,
        stdout: String,
    },

    #[error("notification delivery failed: {0}")]
    Notify(String),
}

/// Builds and executes one jest invocation. A runner is single-use: `run`
/// consumes it, and everything observable about the run lives on the returned
/// [`CompletedRun`].
pub struct Runner {
    settings: RunSettings,
    sink: Box<dyn NotificationSink>,
}

impl Runner {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            settings,
            sink: Box::new(DesktopNotifier),
        }
    }

    pub fn with_sink(settings: RunSettings, sink: Box<dyn NotificationSink>) -> Self {
        Self { settings, sink }
    }

    /// Invokes jest on `paths` (the configured default set when empty),
    /// captures its output, and applies the notification and print policies.
    ///
    /// The verdict is the process exit status; the parsed result counts never
    /// override it.
    pub fn run(self, paths: &[String]) -> Result<CompletedRun, RunError> {
        let out_file = fresh_result_file()?;
        let argv = self.command_for_check(out_file.path(), paths)?;
        let display_command = shell_words::join(&argv);

        let mut command = std::process::Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .current_dir(&self.settings.project_root);

        let timeout = self.settings.timeout_ms.map(Duration::from_millis);
        let captured = run_command_capture(command, &display_command, timeout)?;

        let completed = CompletedRun {
            passed: captured.status.success(),
            stdout: String::from_utf8_lossy(&captured.stdout).to_string(),
            stderr: String::from_utf8_lossy(&captured.stderr).to_string(),
            out_file,
            parsed: OnceCell::new(),
        };

        if self.settings.notification.applies(completed.passed) {
            let note = Notification {
                message: completed.summary_text()?,
                title: "Jest results".to_string(),
                image: if completed.passed {
                    NotifyImage::Success
                } else {
                    NotifyImage::Failed
                },
            };
            self.sink
                .deliver(&note)
                .map_err(|err| RunError::Notify(err.to_string()))?;
        }

        if self.settings.print_result.applies(completed.passed) {
            println!("{}", completed.stderr);
        }

        Ok(completed)
    }

    /// The full argument vector for one check:
    /// `[command, cli..., --json, --colors, --outputFile=<out>, paths...]`.
    pub fn command_for_check(
        &self,
        out_path: &Path,
        paths: &[String],
    ) -> Result<Vec<String>, RunError> {
        let mut argv = vec![resolve_command(
            &self.settings.project_root,
            &self.settings.command,
        )];
        argv.extend(self.settings.resolve_cli_args()?);
        argv.extend([
            "--json".to_string(),
            "--colors".to_string(),
            format!("--outputFile={}", out_path.display()),
        ]);
        if paths.is_empty() {
            argv.extend(self.settings.default_paths.iter().cloned());
        } else {
            argv.extend(paths.iter().cloned());
        }
        Ok(argv)
    }
}

/// A bare command name resolves through the project's own `node_modules/.bin`
/// when that binary exists; anything with a path separator is used verbatim.
fn resolve_command(project_root: &Path, command: &str) -> String {
    if command.contains('/') || command.contains(std::path::MAIN_SEPARATOR) {
        return command.to_string();
    }
    let local = project_root.join("node_modules").join(".bin").join(
        if cfg!(windows) {
            format!("{command}.cmd")
        } else {
            command.to_string()
        },
    );
    if local.exists() {
        local.to_string_lossy().to_string()
    } else {
        command.to_string()
    }
}

fn fresh_result_file() -> Result<NamedTempFile, RunError> {
    tempfile::Builder::new()
        .prefix("jestrel-")
        .suffix(".json")
        .tempfile()
        .map_err(RunError::Io)
}

/// The outcome of one jest invocation. Owns the result file handle so the
/// file stays on disk exactly as long as the run is alive; dropping the run
/// deletes it.
#[derive(Debug)]
pub struct CompletedRun {
    passed: bool,
    stdout: String,
    stderr: String,
    out_file: NamedTempFile,
    parsed: OnceCell<JestRunSummary>,
}

impl CompletedRun {
    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn result_path(&self) -> &Path {
        self.out_file.path()
    }

    pub fn summary_text(&self) -> Result<String, RunError> {
        Ok(summary_text(self.results()?))
    }

    /// Test file paths whose status was `failed`, de-duplicated in first-seen
    /// order. A missing or malformed result file is an error, never an empty
    /// list; silence would be indistinguishable from "no failures".
    pub fn failed_paths(&self) -> Result<Vec<String>, RunError> {
        Ok(self.results()?.failed_file_paths())
    }

    fn results(&self) -> Result<&JestRunSummary, RunError> {
        if let Some(parsed) = self.parsed.get() {
            return Ok(parsed);
        }
        let parsed = self.parse_result_file()?;
        Ok(self.parsed.get_or_init(|| parsed))
    }

    fn parse_result_file(&self) -> Result<JestRunSummary, RunError> {
        let raw = std::fs::read_to_string(self.out_file.path())
            .map_err(|err| self.result_unreadable(err.to_string()))?;
        if raw.trim().is_empty() {
            return Err(self.result_unreadable("result file is empty".to_string()));
        }
        serde_json::from_str::<JestRunSummary>(&raw)
            .map_err(|err| self.result_unreadable(err.to_string()))
    }

    fn result_unreadable(&self, message: String) -> RunError {
        RunError::ResultUnreadable {
            message,
            stderr: strip_ansi(&self.stderr),
            stdout: strip_ansi(&self.stdout),
        }
    }
}

fn strip_ansi(text: &str) -> String {
    String::from_utf8_lossy(&strip_ansi_escapes::strip(text.as_bytes())).to_string()
}
