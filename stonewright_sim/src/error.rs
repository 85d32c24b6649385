// Error type for the host-facing fallible APIs.
//
// Only configuration loading, settings, state records and mode lookup can
// fail in a way the host sees. Inside the tick path nothing is surfaced as
// an error: a strategy that cannot proceed halts itself and reports an
// `EngineEvent::Halted` instead (see `task.rs`).

use crate::config::SettingKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid value {value} for setting {key:?}")]
    InvalidSetting { key: SettingKey, value: i64 },

    #[error("unknown build mode: {0}")]
    UnknownMode(String),

    #[error("state record is missing field `{0}`")]
    MissingField(String),

    #[error("serialization error: {0}")]
    Persist(#[from] serde_json::Error),
}
