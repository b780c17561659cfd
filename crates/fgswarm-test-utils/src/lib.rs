//! Test doubles for the oracle and on-disk fixtures for pipeline inputs.

mod fixture;
mod scripted;

pub use fixture::InputFixture;
pub use scripted::{RecordedRequest, ScriptedLlm, ScriptedTurn};

use fgswarm_core::config::AppConfig;

/// An [`AppConfig`] pointed at a fixture's directories, with budgets small
/// enough that a misbehaving script fails quickly.
pub fn test_config(fixture: &InputFixture) -> AppConfig {
    let mut config = AppConfig::default();
    config.paths.data_dir = fixture.data_dir();
    config.paths.output_dir = fixture.output_dir();
    config.pipeline.max_turns_per_agent = 6;
    config.pipeline.max_total_turns = 30;
    config.pipeline.oracle_timeout_secs = 5;
    config.pipeline.run_timeout_secs = 30;
    config
}
