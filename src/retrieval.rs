//! Retrieval planner: turns a taxonomy filter into store queries that respect
//! the one-in-predicate limit, fans them out concurrently, then filters,
//! deduplicates and shuffles the union.
//!
//! Plan:
//!   - minor topics present: chunk them by the in-list limit, one query per
//!     chunk on minor-topic membership; difficulty is filtered after the fetch
//!   - otherwise: one equality query per major topic, difficulty embedded as
//!     the in-predicate
//!
//! A failing or timed-out query never discards the other queries' rows; it is
//! reported in `Selection::failed_queries`.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RetrievalSettings;
use crate::domain::{ProblemRecord, TaxonomyFilter};
use crate::error::StoreError;
use crate::store::{DocumentStore, ProblemField, ProblemQuery};

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryFailure {
  pub key: String,
  pub error: String,
}

/// Outcome of one retrieval request.
#[derive(Clone, Debug, Default)]
pub struct Selection {
  pub problems: Vec<ProblemRecord>,
  pub failed_queries: Vec<QueryFailure>,
  /// Queries that hit the result cap; matching rows beyond it were never seen.
  pub saturated_queries: Vec<String>,
}

impl Selection {
  pub fn is_partial(&self) -> bool {
    !self.failed_queries.is_empty()
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedQuery {
  pub key: String,
  pub query: ProblemQuery,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
  pub queries: Vec<PlannedQuery>,
  /// False when difficulty still has to be checked after the fetch.
  pub difficulty_in_query: bool,
}

/// Build the store queries for `filter`. Empty when no major topic is selected.
pub fn plan_queries(filter: &TaxonomyFilter, settings: &RetrievalSettings, store_in_limit: usize) -> QueryPlan {
  let in_limit = settings.in_list_limit.min(store_in_limit).max(1);

  if filter.major_topics.is_empty() {
    return QueryPlan { queries: Vec::new(), difficulty_in_query: false };
  }

  if !filter.minor_topics.is_empty() {
    let minors: Vec<String> = filter.minor_topics.iter().cloned().collect();
    let queries = minors
      .chunks(in_limit)
      .enumerate()
      .map(|(i, chunk)| PlannedQuery {
        key: format!("minor chunk {} ({} topics)", i, chunk.len()),
        query: ProblemQuery::new(settings.query_limit).where_in(ProblemField::MinorTopic, chunk.to_vec()),
      })
      .collect();
    return QueryPlan { queries, difficulty_in_query: false };
  }

  let embed_difficulty = !filter.difficulties.is_empty() && filter.difficulties.len() <= in_limit;
  let queries = filter
    .major_topics
    .iter()
    .map(|topic| {
      let mut query = ProblemQuery::new(settings.query_limit).where_eq(ProblemField::MajorTopic, topic.clone());
      if embed_difficulty {
        let labels = filter.difficulties.iter().map(|d| d.as_str().to_string()).collect();
        query = query.where_in(ProblemField::Difficulty, labels);
      }
      PlannedQuery { key: format!("major {}", topic), query }
    })
    .collect();
  QueryPlan { queries, difficulty_in_query: embed_difficulty }
}

async fn run_query(
  store: &dyn DocumentStore,
  planned: &PlannedQuery,
  timeout: Duration,
) -> Result<Vec<ProblemRecord>, StoreError> {
  match tokio::time::timeout(timeout, store.query_problems(&planned.query)).await {
    Ok(res) => res,
    Err(_) => Err(StoreError::Timeout(timeout)),
  }
}

struct Fetched {
  candidates: Vec<ProblemRecord>,
  difficulty_in_query: bool,
  failed_queries: Vec<QueryFailure>,
  saturated_queries: Vec<String>,
}

async fn fetch_candidates(
  store: &dyn DocumentStore,
  filter: &TaxonomyFilter,
  settings: &RetrievalSettings,
) -> Fetched {
  let plan = plan_queries(filter, settings, store.in_list_limit());
  let timeout = settings.query_timeout();
  debug!(target: "retrieval", queries = plan.queries.len(), difficulty_in_query = plan.difficulty_in_query, "query plan built");

  let outcomes = join_all(plan.queries.iter().map(|pq| run_query(store, pq, timeout))).await;

  let mut seen = HashSet::new();
  let mut fetched = Fetched {
    candidates: Vec::new(),
    difficulty_in_query: plan.difficulty_in_query,
    failed_queries: Vec::new(),
    saturated_queries: Vec::new(),
  };
  for (planned, outcome) in plan.queries.iter().zip(outcomes) {
    match outcome {
      Ok(rows) => {
        if rows.len() >= planned.query.limit {
          warn!(target: "retrieval", key = %planned.key, cap = planned.query.limit, "query hit result cap; matches may be truncated");
          fetched.saturated_queries.push(planned.key.clone());
        }
        for row in rows {
          if seen.insert(row.id.clone()) {
            fetched.candidates.push(row);
          }
        }
      }
      Err(e) => {
        error!(target: "retrieval", key = %planned.key, error = %e, "store query failed; continuing with remaining queries");
        fetched.failed_queries.push(QueryFailure { key: planned.key.clone(), error: e.to_string() });
      }
    }
  }
  fetched
}

/// Post-fetch filters in their fixed order: difficulty (when not already
/// applied by the store), question type, curriculum scope, exclusions.
pub fn apply_post_filters(
  candidates: Vec<ProblemRecord>,
  filter: &TaxonomyFilter,
  difficulty_in_query: bool,
) -> Vec<ProblemRecord> {
  let check_difficulty = !difficulty_in_query && !filter.difficulties.is_empty();
  candidates
    .into_iter()
    .filter(|p| !check_difficulty || filter.difficulties.contains(&p.difficulty))
    .filter(|p| filter.question_types.contains(&p.effective_question_type()))
    .filter(|p| !filter.exclude_supplementary || p.is_core_curriculum())
    .filter(|p| !filter.excluded_ids.contains(&p.id))
    .collect()
}

impl Fetched {
  fn finish<R: Rng + ?Sized>(self, filter: &TaxonomyFilter, rng: &mut R) -> Selection {
    let fetched_count = self.candidates.len();
    let mut problems = apply_post_filters(self.candidates, filter, self.difficulty_in_query);
    // Fisher–Yates: from the last index down, swap with a uniform index in 0..=i.
    problems.shuffle(rng);
    if let Some(limit) = filter.limit {
      problems.truncate(limit);
    }
    info!(
      target: "retrieval",
      fetched = fetched_count,
      selected = problems.len(),
      failed = self.failed_queries.len(),
      saturated = self.saturated_queries.len(),
      "problems selected"
    );
    Selection {
      problems,
      failed_queries: self.failed_queries,
      saturated_queries: self.saturated_queries,
    }
  }
}

/// Select problems for `filter` in a uniformly random order.
#[instrument(level = "info", skip_all, fields(majors = filter.major_topics.len(), minors = filter.minor_topics.len()))]
pub async fn select_problems(
  store: &dyn DocumentStore,
  filter: &TaxonomyFilter,
  settings: &RetrievalSettings,
) -> Selection {
  if filter.major_topics.is_empty() {
    debug!(target: "retrieval", "no major topic selected");
    return Selection::default();
  }
  let fetched = fetch_candidates(store, filter, settings).await;
  let mut rng = rand::thread_rng();
  fetched.finish(filter, &mut rng)
}

/// Same as `select_problems` with a caller-supplied random source.
pub async fn select_problems_with_rng<R: Rng + ?Sized>(
  store: &dyn DocumentStore,
  filter: &TaxonomyFilter,
  settings: &RetrievalSettings,
  rng: &mut R,
) -> Selection {
  if filter.major_topics.is_empty() {
    return Selection::default();
  }
  let fetched = fetch_candidates(store, filter, settings).await;
  fetched.finish(filter, rng)
}
