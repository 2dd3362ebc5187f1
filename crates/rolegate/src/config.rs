//! Gate configuration.

use rolegate_authz::EvaluationMode;
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Which evaluator answers entitlement checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Always walk the hierarchy at query time.
    Live,
    /// Always use the closure table, however old.
    Materialized,
    /// Use the closure table while it is fresh, otherwise evaluate live
    /// in inherited mode.
    #[default]
    MaterializedOrLive,
}

/// Configuration for a [`Gate`](crate::Gate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub strategy: Strategy,

    /// Mode used by [`Strategy::Live`].
    pub live_mode: EvaluationMode,

    /// Rebuild a stale or missing closure before answering instead of
    /// using it as is (`Materialized`) or falling back (`MaterializedOrLive`).
    pub rebuild_on_stale: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::MaterializedOrLive,
            live_mode: EvaluationMode::Inherited,
            rebuild_on_stale: false,
        }
    }
}

impl GateConfig {
    /// Live evaluation only.
    pub fn live(mode: EvaluationMode) -> Self {
        Self {
            strategy: Strategy::Live,
            live_mode: mode,
            ..Default::default()
        }
    }

    /// Closure lookups only.
    pub fn materialized() -> Self {
        Self {
            strategy: Strategy::Materialized,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| GateError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.strategy {
            Strategy::Live if self.rebuild_on_stale => Err(GateError::InvalidConfig(
                "rebuild_on_stale has no effect with the live strategy".into(),
            )),
            // The fallback must agree with the closure, which is inherited.
            Strategy::MaterializedOrLive if self.live_mode == EvaluationMode::Direct => {
                Err(GateError::InvalidConfig(
                    "materialized_or_live requires live_mode = inherited".into(),
                ))
            }
            _ => Ok(()),
        }
    }
}
