/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde::{Deserialize, Serialize};

/// Runtime tunables loaded from `--config`. Missing on disk is not an
/// error: callers fall back to [`Config::default`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Owner stamped on the synthesized root entry, which has no `paths`
    /// row of its own to carry a uid/gid (see [`crate::types::Stat::root`])
    pub default_uid: u32,
    pub default_gid: u32,
    /// Number of worker threads the bridge dispatches I/O on
    pub worker_threads: usize,
    /// Path to the log4rs YAML config; falls back to an in-code default
    /// logger when absent
    pub log_config_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_uid: 0,
            default_gid: 0,
            worker_threads: 2,
            log_config_path: "./log4rs.yml".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_worker_count() {
        let config = Config::default();
        assert!(config.worker_threads >= 1);
    }

    #[test]
    fn partial_toml_fills_remaining_fields_from_default() {
        let config: Config = toml::from_str("worker_threads = 8\n").unwrap();
        assert_eq!(config.worker_threads, 8);
        assert_eq!(config.default_uid, 0);
        assert_eq!(config.log_config_path, "./log4rs.yml");
    }
}
