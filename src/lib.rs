pub mod config;
pub mod format;
pub mod notify;
pub mod plugin;
pub mod process;
pub mod runner;
pub mod test_model;

#[cfg(test)]
mod runner_test;

pub fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
