#![allow(dead_code)]
//! Fixtures shared by the integration tests.

pub mod fixtures;
pub mod mock_filter;

use std::collections::HashMap;

/// Builds an environment for `EnvSource`-driven configuration.
///
/// The mackerel-agent config path is pinned to a nonexistent file so the
/// host's real agent never leaks into a test.
pub fn test_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    env.entry("MACKEREL_AGENT_CONFIG".to_string())
        .or_insert_with(|| "/nonexistent/mackerel-agent.conf".to_string());
    env
}
