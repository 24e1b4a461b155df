use indexmap::IndexSet;
use serde::Deserialize;

pub const STATUS_FAILED: &str = "failed";

/// The document jest writes through `--outputFile` when run with `--json`.
/// Only the fields this crate consumes are modeled; the rest is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestRunSummary {
    pub num_total_tests: u64,
    pub num_passed_tests: u64,
    pub num_pending_tests: u64,
    pub num_failed_tests: u64,
    #[serde(default)]
    pub test_results: Vec<TestFileResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestFileResult {
    pub name: String,
    pub status: String,
}

impl JestRunSummary {
    /// Paths of test files that failed, de-duplicated in first-seen order.
    pub fn failed_file_paths(&self) -> Vec<String> {
        self.test_results
            .iter()
            .filter(|file| file.status == STATUS_FAILED)
            .map(|file| file.name.clone())
            .collect::<IndexSet<String>>()
            .into_iter()
            .collect()
    }
}
