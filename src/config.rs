//! Loading engine configuration (tuning knobs, taxonomy, seed collections) from TOML.
//!
//! See `EngineConfig` for the expected schema. Every section is optional.
//! Timestamps in seed data must be quoted RFC 3339 strings.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::{ExamDefinition, ExamResult, ProblemRecord};
use crate::taxonomy::Unit;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineConfig {
  #[serde(default)]
  pub retrieval: RetrievalSettings,
  #[serde(default)]
  pub weakness: WeaknessSettings,
  #[serde(default)]
  pub regression: RegressionCfg,
  #[serde(default)]
  pub taxonomy: TaxonomyCfg,
  #[serde(default)]
  pub problems: Vec<ProblemRecord>,
  #[serde(default)]
  pub exam_definitions: Vec<ExamDefinition>,
  #[serde(default)]
  pub exam_results: Vec<ExamResult>,
}

/// Limits of the problem store and of the planner's fan-out.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
  /// Longest "is one of" list per query.
  pub in_list_limit: usize,
  /// Result cap applied to every chunk/topic query.
  pub query_limit: usize,
  pub query_timeout_ms: u64,
}

impl Default for RetrievalSettings {
  fn default() -> Self {
    Self { in_list_limit: 10, query_limit: 500, query_timeout_ms: 5_000 }
  }
}

impl RetrievalSettings {
  pub fn query_timeout(&self) -> Duration {
    Duration::from_millis(self.query_timeout_ms)
  }

  /// Zero limits would make every query fail or count as saturated; raise them to 1.
  pub fn clamped(mut self) -> Self {
    if self.in_list_limit == 0 {
      warn!(target: "rmcontents_backend", "retrieval.in_list_limit = 0 is unusable; using 1");
      self.in_list_limit = 1;
    }
    if self.query_limit == 0 {
      warn!(target: "rmcontents_backend", "retrieval.query_limit = 0 is unusable; using 1");
      self.query_limit = 1;
    }
    self
  }
}

/// Weighting model and evidence gates of the weakness estimator.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeaknessSettings {
  /// Per-day decay rate; 0.015 halves a sample's weight in ~46 days.
  pub decay_lambda: f64,
  pub min_samples: usize,
  pub max_exam_definitions: usize,
  pub store_timeout_ms: u64,
  pub solver_timeout_ms: u64,
}

impl Default for WeaknessSettings {
  fn default() -> Self {
    Self {
      decay_lambda: 0.015,
      min_samples: 5,
      max_exam_definitions: 10,
      store_timeout_ms: 5_000,
      solver_timeout_ms: 10_000,
    }
  }
}

impl WeaknessSettings {
  pub fn store_timeout(&self) -> Duration {
    Duration::from_millis(self.store_timeout_ms)
  }

  pub fn solver_timeout(&self) -> Duration {
    Duration::from_millis(self.solver_timeout_ms)
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RegressionCfg {
  /// Endpoint of the regression service. REGRESSION_API_URL overrides it.
  #[serde(default)]
  pub url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TaxonomyCfg {
  /// Reject filters whose labels are not in the registry.
  #[serde(default = "default_true")]
  pub enforce: bool,
  /// Replaces the built-in hierarchy when non-empty.
  #[serde(default)]
  pub units: Vec<Unit>,
}

impl Default for TaxonomyCfg {
  fn default() -> Self {
    Self { enforce: true, units: Vec::new() }
  }
}

fn default_true() -> bool {
  true
}

pub fn parse_engine_config(s: &str) -> Result<EngineConfig, toml::de::Error> {
  let mut cfg = toml::from_str::<EngineConfig>(s)?;
  cfg.retrieval = cfg.retrieval.clamped();
  if cfg.weakness.max_exam_definitions == 0 {
    warn!(target: "rmcontents_backend", "weakness.max_exam_definitions = 0 is unusable; using 1");
    cfg.weakness.max_exam_definitions = 1;
  }
  Ok(cfg)
}

/// Attempt to load `EngineConfig` from ENGINE_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_engine_config_from_env() -> Option<EngineConfig> {
  let path = std::env::var("ENGINE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_engine_config(&s) {
      Ok(cfg) => {
        info!(target: "rmcontents_backend", %path, problems = cfg.problems.len(), exam_results = cfg.exam_results.len(), "Loaded engine config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "rmcontents_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "rmcontents_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
