#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use jestrel::config::{JestrelConfig, ReportPolicy, RunSettings};
use jestrel::notify::{Notification, NotificationSink, NotifyError, NotifyImage};
use jestrel::runner::{RunError, Runner};

const PASSING_RESULT: &str = r#"{
  "numTotalTests": 5,
  "numPassedTests": 5,
  "numPendingTests": 0,
  "numFailedTests": 0,
  "testResults": []
}"#;

const FAILING_RESULT: &str = r#"{
  "numTotalTests": 3,
  "numPassedTests": 1,
  "numPendingTests": 1,
  "numFailedTests": 1,
  "testResults": [
    { "name": "z.test.js", "status": "failed" },
    { "name": "a.test.js", "status": "passed" },
    { "name": "b.test.js", "status": "failed" },
    { "name": "z.test.js", "status": "failed" }
  ]
}"#;

/// A stand-in jest: finds its own `--outputFile=` argument, writes `result`
/// into it, and exits with `exit_code`.
fn write_fake_jest(dir: &Path, result: &str, exit_code: i32) -> PathBuf {
    let result_file = dir.join("canned-result.json");
    std::fs::write(&result_file, result).unwrap();

    let script = format!(
        r#"#!/bin/sh
out=""
for arg in "$@"; do
  case "$arg" in
    --outputFile=*) out="${{arg#--outputFile=}}" ;;
  esac
done
echo "$@" >> "{calls}"
cat "{result}" > "$out"
echo "jest human output" >&2
exit {exit_code}
"#,
        calls = dir.join("calls.log").display(),
        result = result_file.display(),
    );
    write_script(dir, "fake-jest.sh", &script)
}

/// A stand-in jest that never writes the result file.
fn write_silent_jest(dir: &Path, exit_code: i32) -> PathBuf {
    let script = format!(
        "#!/bin/sh\necho \"some stdout info\"\necho \"boom from stderr\" >&2\nexit {exit_code}\n"
    );
    write_script(dir, "silent-jest.sh", &script)
}

fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn quiet_settings(root: &Path, command: &Path) -> RunSettings {
    let mut settings = RunSettings::from_config(root, &JestrelConfig::default());
    settings.command = command.to_string_lossy().to_string();
    settings.notification = ReportPolicy::Never;
    settings.print_result = ReportPolicy::Never;
    settings
}

#[derive(Default)]
struct RecordingSink(Arc<Mutex<Vec<Notification>>>);

impl RecordingSink {
    fn handle(&self) -> Arc<Mutex<Vec<Notification>>> {
        Arc::clone(&self.0)
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, note: &Notification) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(note.clone());
        Ok(())
    }
}

#[test]
fn passing_run_reports_verdict_summary_and_no_failed_paths() {
    let temp = TempDir::new().unwrap();
    let jest = write_fake_jest(temp.path(), PASSING_RESULT, 0);
    let settings = quiet_settings(temp.path(), &jest);

    let completed = Runner::new(settings)
        .run(&["a.test.js".to_string()])
        .unwrap();
    assert!(completed.passed());
    assert_eq!(completed.summary_text().unwrap(), "5 passed.");
    assert!(completed.failed_paths().unwrap().is_empty());
    assert!(completed.stderr().contains("jest human output"));
}

#[test]
fn failing_run_extracts_failed_paths_deduplicated_in_first_seen_order() {
    let temp = TempDir::new().unwrap();
    let jest = write_fake_jest(temp.path(), FAILING_RESULT, 1);
    let settings = quiet_settings(temp.path(), &jest);

    let completed = Runner::new(settings)
        .run(&["z.test.js".to_string()])
        .unwrap();
    assert!(!completed.passed());
    assert_eq!(
        completed.summary_text().unwrap(),
        "1 example failed (1 passed, 1 pending)."
    );
    assert_eq!(completed.failed_paths().unwrap(), vec!["z.test.js", "b.test.js"]);
}

#[test]
fn exit_status_is_authoritative_over_parsed_counts() {
    let temp = TempDir::new().unwrap();
    // Inconsistent tool output: zero failures reported, nonzero exit.
    let jest = write_fake_jest(temp.path(), PASSING_RESULT, 1);
    let settings = quiet_settings(temp.path(), &jest);

    let completed = Runner::new(settings).run(&[]).unwrap();
    assert!(!completed.passed());
    assert_eq!(completed.summary_text().unwrap(), "5 passed.");
}

#[test]
fn empty_paths_reach_jest_as_the_configured_default_set() {
    let temp = TempDir::new().unwrap();
    let jest = write_fake_jest(temp.path(), PASSING_RESULT, 0);
    let mut settings = quiet_settings(temp.path(), &jest);
    settings.default_paths = vec!["lib/**/*.spec.js".to_string()];

    Runner::new(settings).run(&[]).unwrap();

    let calls = std::fs::read_to_string(temp.path().join("calls.log")).unwrap();
    assert!(calls.contains("lib/**/*.spec.js"));
    assert!(calls.contains("--json"));
    assert!(calls.contains("--colors"));
}

#[test]
fn each_run_gets_a_fresh_result_file_kept_until_drop() {
    let temp = TempDir::new().unwrap();
    let jest = write_fake_jest(temp.path(), PASSING_RESULT, 0);
    let settings = quiet_settings(temp.path(), &jest);

    let first = Runner::new(settings.clone()).run(&[]).unwrap();
    let second = Runner::new(settings).run(&[]).unwrap();
    assert_ne!(first.result_path(), second.result_path());

    let kept = first.result_path().to_path_buf();
    assert!(kept.exists());
    assert!(first.failed_paths().is_ok());
    drop(first);
    assert!(!kept.exists());
}

#[test]
fn launch_failure_names_the_attempted_command() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("definitely-missing-jest");
    let settings = quiet_settings(temp.path(), &missing);

    let err = Runner::new(settings)
        .run(&["a.test.js".to_string()])
        .unwrap_err();
    match &err {
        RunError::LaunchFailed { command, .. } => {
            assert!(command.contains("definitely-missing-jest"));
            assert!(command.contains("a.test.js"));
        }
        other => panic!("expected LaunchFailed, got {other:?}"),
    }
}

#[test]
fn unreadable_result_embeds_both_captured_streams() {
    let temp = TempDir::new().unwrap();
    let jest = write_silent_jest(temp.path(), 1);
    let settings = quiet_settings(temp.path(), &jest);

    let completed = Runner::new(settings).run(&[]).unwrap();
    assert!(!completed.passed());

    let err = completed.failed_paths().unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("boom from stderr"));
    assert!(rendered.contains("some stdout info"));

    let err = completed.summary_text().unwrap_err();
    assert!(matches!(err, RunError::ResultUnreadable { .. }));
}

#[test]
fn notification_policy_always_notifies_on_success() {
    let temp = TempDir::new().unwrap();
    let jest = write_fake_jest(temp.path(), PASSING_RESULT, 0);
    let mut settings = quiet_settings(temp.path(), &jest);
    settings.notification = ReportPolicy::Always;

    let sink = RecordingSink::default();
    let notes = sink.handle();
    Runner::with_sink(settings, Box::new(sink)).run(&[]).unwrap();

    let notes = notes.lock().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].message, "5 passed.");
    assert_eq!(notes[0].title, "Jest results");
    assert_eq!(notes[0].image, NotifyImage::Success);
}

#[test]
fn notification_policy_on_failure_skips_passing_runs() {
    let temp = TempDir::new().unwrap();
    let jest = write_fake_jest(temp.path(), PASSING_RESULT, 0);
    let mut settings = quiet_settings(temp.path(), &jest);
    settings.notification = ReportPolicy::OnFailure;

    let sink = RecordingSink::default();
    let notes = sink.handle();
    Runner::with_sink(settings, Box::new(sink)).run(&[]).unwrap();

    assert!(notes.lock().unwrap().is_empty());
}

#[test]
fn notification_policy_on_failure_fires_for_failing_runs() {
    let temp = TempDir::new().unwrap();
    let jest = write_fake_jest(temp.path(), FAILING_RESULT, 1);
    let mut settings = quiet_settings(temp.path(), &jest);
    settings.notification = ReportPolicy::OnFailure;

    let sink = RecordingSink::default();
    let notes = sink.handle();
    Runner::with_sink(settings, Box::new(sink)).run(&[]).unwrap();

    let notes = notes.lock().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].image, NotifyImage::Failed);
}

#[test]
fn notifying_with_an_unreadable_result_fails_the_run() {
    let temp = TempDir::new().unwrap();
    let jest = write_silent_jest(temp.path(), 1);
    let mut settings = quiet_settings(temp.path(), &jest);
    settings.notification = ReportPolicy::OnFailure;

    let sink = RecordingSink::default();
    let err = Runner::with_sink(settings, Box::new(sink))
        .run(&[])
        .unwrap_err();
    assert!(matches!(err, RunError::ResultUnreadable { .. }));
}

#[test]
fn timeout_kills_a_hung_jest() {
    let temp = TempDir::new().unwrap();
    let jest = write_script(temp.path(), "hung-jest.sh", "#!/bin/sh\nexec sleep 30\n");
    let mut settings = quiet_settings(temp.path(), &jest);
    settings.timeout_ms = Some(200);

    let err = Runner::new(settings).run(&[]).unwrap_err();
    assert!(matches!(err, RunError::TimedOut { timeout_ms: 200, .. }));
}
