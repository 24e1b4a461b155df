use crate::test_model::JestRunSummary;

/// One-line human summary of a run, e.g. `2 examples failed (3 passed, 1 pending).`
pub fn summary_text(summary: &JestRunSummary) -> String {
    let passed = summary.num_passed_tests;
    let pending = summary.num_pending_tests;
    let failed = summary.num_failed_tests;

    if failed > 0 {
        let mut text = format!("{} failed ({passed} passed", pluralize(failed, "example", false));
        if pending > 0 {
            text.push_str(&format!(", {pending} pending"));
        }
        text.push_str(").");
        text
    } else {
        let mut text = format!("{passed} passed");
        if pending > 0 {
            text.push_str(&format!(" ({pending} pending)"));
        }
        text.push('.');
        text
    }
}

/// A count of exactly 1 keeps the singular noun; `no_for_zero` renders a zero
/// count as the word instead of the digit.
pub fn pluralize(count: u64, noun: &str, no_for_zero: bool) -> String {
    let shown = if count == 0 && no_for_zero {
        "no".to_string()
    } else {
        count.to_string()
    };
    let suffix = if count == 1 { "" } else { "s" };
    format!("{shown} {noun}{suffix}")
}
