//! Application state: the document store, the regression solver, the topic
//! registry and the engine settings.
//!
//! Everything here is read-only after startup; request handlers share it
//! through an `Arc` and hold no locks.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::config::{load_engine_config_from_env, EngineConfig, RetrievalSettings, WeaknessSettings};
use crate::domain::TaxonomyFilter;
use crate::error::TaxonomyError;
use crate::regression::{HttpRegressionClient, OneHotSolver, RegressionSolver};
use crate::retrieval::{select_problems, Selection};
use crate::seeds::{seed_exam_history, seed_problems};
use crate::store::{DocumentStore, MemoryStore};
use crate::taxonomy::TaxonomyRegistry;
use crate::weakness::{estimate_weakness, Diagnosis};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub solver: Arc<dyn RegressionSolver>,
    pub taxonomy: TaxonomyRegistry,
    pub enforce_taxonomy: bool,
    pub retrieval: RetrievalSettings,
    pub weakness: WeaknessSettings,
}

impl AppState {
    /// Build state from env: load config, seed the store, pick the solver.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_engine_config_from_env().unwrap_or_default())
    }

    pub fn from_config(cfg: EngineConfig) -> Self {
        let taxonomy = if cfg.taxonomy.units.is_empty() {
            TaxonomyRegistry::builtin()
        } else {
            TaxonomyRegistry::new(cfg.taxonomy.units.clone())
        };

        let (problems, definitions, results) = if cfg.problems.is_empty() {
            warn!(target: "rmcontents_backend", "No problems configured; loading built-in demo catalog and history");
            let (defs, results) = seed_exam_history(Utc::now());
            (seed_problems(&taxonomy), defs, results)
        } else {
            (cfg.problems, cfg.exam_definitions, cfg.exam_results)
        };

        // Inventory summary by major topic.
        let mut count_by_major: BTreeMap<&str, usize> = BTreeMap::new();
        for p in &problems {
            *count_by_major.entry(p.major_topic.as_str()).or_default() += 1;
        }
        for (major, count) in &count_by_major {
            info!(target: "retrieval", %major, count, "Startup catalog inventory");
        }
        info!(target: "weakness", exam_definitions = definitions.len(), exam_results = results.len(), "Startup exam history");

        let retrieval = cfg.retrieval.clamped();
        let store = MemoryStore::new(problems, definitions, results, retrieval.in_list_limit);
        info!(target: "retrieval", problems = store.problem_count(), in_list_limit = retrieval.in_list_limit, "Problem store ready");

        let solver: Arc<dyn RegressionSolver> =
            match HttpRegressionClient::from_env(cfg.regression.url.as_deref(), cfg.weakness.solver_timeout()) {
                Some(client) => {
                    info!(target: "rmcontents_backend", url = %client.url, "Regression service enabled.");
                    Arc::new(client)
                }
                None => {
                    info!(target: "rmcontents_backend", "Regression service disabled (no REGRESSION_API_URL). Using local one-hot solver.");
                    Arc::new(OneHotSolver)
                }
            };

        Self {
            store: Arc::new(store),
            solver,
            taxonomy,
            enforce_taxonomy: cfg.taxonomy.enforce,
            retrieval,
            weakness: cfg.weakness,
        }
    }

    /// Validate the filter against the registry (when enforced), then retrieve.
    #[instrument(level = "info", skip(self, filter))]
    pub async fn select_problems(&self, filter: &TaxonomyFilter) -> Result<Selection, TaxonomyError> {
        if self.enforce_taxonomy {
            self.taxonomy.validate(filter)?;
        }
        Ok(select_problems(self.store.as_ref(), filter, &self.retrieval).await)
    }

    /// Diagnose a student as of now.
    #[instrument(level = "info", skip(self))]
    pub async fn diagnose(&self, student_id: &str, class_id: &str) -> Diagnosis {
        estimate_weakness(
            self.store.as_ref(),
            self.solver.as_ref(),
            &self.weakness,
            student_id,
            class_id,
            Utc::now(),
        )
        .await
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
