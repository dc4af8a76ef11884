//! Process configuration, assembled once by the binary and passed down.

use std::path::PathBuf;

pub const DEFAULT_DISPATCH_FILE: &str = "job.json";
pub const DEFAULT_BASE_URL: &str = "https://www.dkb.de";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON file holding the `dispatch` job list.
    pub dispatch_file: PathBuf,
    /// Stage transfers but never submit them.
    pub dry_run: bool,
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatch_file: PathBuf::from(DEFAULT_DISPATCH_FILE),
            dry_run: false,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}
