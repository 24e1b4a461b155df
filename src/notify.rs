use std::path::PathBuf;

use duct::cmd as duct_cmd;
use thiserror::Error;
use which::which;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyImage {
    Success,
    Failed,
}

impl NotifyImage {
    pub fn as_str(self) -> &'static str {
        match self {
            NotifyImage::Success => "success",
            NotifyImage::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub title: String,
    pub image: NotifyImage,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier `{notifier}` exited with {code:?}")]
    DeliveryFailed {
        notifier: String,
        code: Option<i32>,
    },

    #[error("failed to invoke notifier `{notifier}`: {message}")]
    InvokeFailed { notifier: String, message: String },
}

/// Where run summaries are delivered. The shipped sink talks to the desktop
/// notification system; tests substitute their own.
pub trait NotificationSink {
    fn deliver(&self, note: &Notification) -> Result<(), NotifyError>;
}

/// Delivers through whichever desktop notifier is on PATH: `notify-send`,
/// `terminal-notifier`, or `osascript`. Without one, the summary falls back
/// to a stderr line rather than failing the run.
pub struct DesktopNotifier;

impl NotificationSink for DesktopNotifier {
    fn deliver(&self, note: &Notification) -> Result<(), NotifyError> {
        let Some((notifier, argv)) = notifier_invocation(note) else {
            eprintln!("jestrel: {} ({})", note.message, note.image.as_str());
            return Ok(());
        };

        let out = duct_cmd(&notifier, argv)
            .stdout_null()
            .stderr_null()
            .unchecked()
            .run()
            .map_err(|err| NotifyError::InvokeFailed {
                notifier: notifier.to_string_lossy().to_string(),
                message: err.to_string(),
            })?;

        if out.status.success() {
            Ok(())
        } else {
            Err(NotifyError::DeliveryFailed {
                notifier: notifier.to_string_lossy().to_string(),
                code: out.status.code(),
            })
        }
    }
}

fn notifier_invocation(note: &Notification) -> Option<(PathBuf, Vec<String>)> {
    if let Ok(bin) = which("notify-send") {
        let urgency = match note.image {
            NotifyImage::Success => "low",
            NotifyImage::Failed => "critical",
        };
        return Some((
            bin,
            vec![
                "--urgency".to_string(),
                urgency.to_string(),
                "--app-name".to_string(),
                "jestrel".to_string(),
                note.title.clone(),
                note.message.clone(),
            ],
        ));
    }

    if let Ok(bin) = which("terminal-notifier") {
        return Some((
            bin,
            vec![
                "-title".to_string(),
                note.title.clone(),
                "-subtitle".to_string(),
                note.image.as_str().to_string(),
                "-message".to_string(),
                note.message.clone(),
            ],
        ));
    }

    if let Ok(bin) = which("osascript") {
        let script = format!(
            "display notification {} with title {}",
            applescript_quote(&note.message),
            applescript_quote(&note.title),
        );
        return Some((bin, vec!["-e".to_string(), script]));
    }

    None
}

fn applescript_quote(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}
