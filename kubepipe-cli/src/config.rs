//! Configuration module
//!
//! Turns parsed arguments into the settings a run needs.

use kubepipe_runner::RunnerConfig;
use std::path::PathBuf;

/// Crates whose logs `--debug` turns up
const CRATES: [&str; 5] = [
    "kubepipe",
    "kubepipe_core",
    "kubepipe_spec",
    "kubepipe_client",
    "kubepipe_runner",
];

/// CLI configuration for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub pipeline_file: PathBuf,
    pub kube_config: Option<PathBuf>,
    pub debug: bool,
    pub runner: RunnerConfig,
}

impl Config {
    /// Default log filter, used when `RUST_LOG` is not set
    pub fn log_filter(&self) -> String {
        if self.debug {
            let mut directives = vec!["warn".to_string()];
            directives.extend(CRATES.iter().map(|krate| format!("{}=debug", krate)));
            directives.join(",")
        } else {
            "warn".to_string()
        }
    }
}
