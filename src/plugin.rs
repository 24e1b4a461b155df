use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use thiserror::Error;

use crate::config::RunSettings;
use crate::runner::{RunError, Runner};

/// Raised to the watch host when a completed run did not pass. Broken runs
/// (config, launch, unreadable-result errors) are logged instead so the
/// watch loop keeps going.
#[derive(Debug, Error)]
#[error("jest run failed")]
pub struct TaskFailed;

/// The glue a file-watch host drives. Each hook receives the changed paths,
/// hands a cleaned set to a fresh [`Runner`], and remembers which test files
/// failed so they can be re-run on the next change.
pub struct JestrelPlugin {
    settings: RunSettings,
    failed_paths: Vec<String>,
}

impl JestrelPlugin {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            settings,
            failed_paths: vec![],
        }
    }

    pub fn failed_paths(&self) -> &[String] {
        &self.failed_paths
    }

    /// Called once when the watch host starts.
    pub fn on_start(&mut self) -> Result<(), TaskFailed> {
        eprintln!("jestrel: watching for javascript changes");
        if self.settings.all_on_start {
            self.run_all()
        } else {
            Ok(())
        }
    }

    pub fn run_all(&mut self) -> Result<(), TaskFailed> {
        eprintln!("jestrel: running jest for all javascript files");
        self.inspect_with_jest(vec![])
    }

    pub fn run_on_additions(&mut self, paths: &[PathBuf]) -> Result<(), TaskFailed> {
        self.run_partially(paths)
    }

    pub fn run_on_modifications(&mut self, paths: &[PathBuf]) -> Result<(), TaskFailed> {
        self.run_partially(paths)
    }

    /// Host-triggered reload; remembered failures are dropped.
    pub fn reload(&mut self) {
        self.failed_paths.clear();
    }

    fn run_partially(&mut self, paths: &[PathBuf]) -> Result<(), TaskFailed> {
        let mut candidates = paths.to_vec();
        if self.settings.keep_failed {
            candidates.extend(self.failed_paths.iter().map(PathBuf::from));
        }

        let cleaned = clean_paths(&candidates);
        if cleaned.is_empty() {
            return Ok(());
        }

        let displayed = cleaned
            .iter()
            .map(|path| smart_path(&self.settings.project_root, path))
            .collect::<Vec<_>>();
        eprintln!("jestrel: running jest: {}", displayed.join(" "));

        let run_paths = cleaned
            .iter()
            .map(|path| path.to_string_lossy().to_string())
            .collect::<Vec<_>>();
        self.inspect_with_jest(run_paths)
    }

    fn inspect_with_jest(&mut self, paths: Vec<String>) -> Result<(), TaskFailed> {
        match self.run_once(&paths) {
            Ok(true) => Ok(()),
            Ok(false) => Err(TaskFailed),
            Err(err) => {
                eprintln!("jestrel: {err}");
                Ok(())
            }
        }
    }

    fn run_once(&mut self, paths: &[String]) -> Result<bool, RunError> {
        let completed = Runner::new(self.settings.clone()).run(paths)?;
        self.failed_paths = completed.failed_paths()?;
        Ok(completed.passed())
    }
}

/// Absolutizes, drops paths that no longer exist, de-duplicates preserving
/// first-seen order, and drops paths already covered by a directory that is
/// itself in the set.
pub fn clean_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let absolute = paths
        .iter()
        .filter_map(|path| dunce::canonicalize(path).ok())
        .collect::<IndexSet<PathBuf>>();

    absolute
        .iter()
        .filter(|path| !covered_by_other_path(path, &absolute))
        .cloned()
        .collect()
}

fn covered_by_other_path(target: &Path, all: &IndexSet<PathBuf>) -> bool {
    all.iter()
        .filter(|candidate| candidate.as_path() != target && candidate.is_dir())
        .any(|dir| target.starts_with(dir))
}

/// Paths inside the project root display relative; everything else verbatim.
pub fn smart_path(project_root: &Path, path: &Path) -> String {
    if path.starts_with(project_root) {
        pathdiff::diff_paths(path, project_root)
            .unwrap_or_else(|| path.to_path_buf())
            .to_string_lossy()
            .to_string()
    } else {
        path.to_string_lossy().to_string()
    }
}
