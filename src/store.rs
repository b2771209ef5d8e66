//! Document-store seam.
//!
//! The backing store answers equality predicates plus at most one "value is one
//! of" predicate per query, with a bounded list length and a result cap. The
//! query type makes the single in-slot structural; the store rejects lists that
//! are too long.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::domain::{ExamDefinition, ExamResult, ProblemRecord};
use crate::error::StoreError;

/// Indexed fields of the `problems` collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemField {
  MajorTopic,
  MinorTopic,
  Difficulty,
}

impl ProblemField {
  fn value_of(self, p: &ProblemRecord) -> &str {
    match self {
      ProblemField::MajorTopic => &p.major_topic,
      ProblemField::MinorTopic => &p.minor_topic,
      ProblemField::Difficulty => p.difficulty.as_str(),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProblemQuery {
  pub equals: Vec<(ProblemField, String)>,
  pub one_of: Option<(ProblemField, Vec<String>)>,
  pub limit: usize,
}

impl ProblemQuery {
  pub fn new(limit: usize) -> Self {
    Self { equals: Vec::new(), one_of: None, limit }
  }

  pub fn where_eq(mut self, field: ProblemField, value: impl Into<String>) -> Self {
    self.equals.push((field, value.into()));
    self
  }

  /// Sets the query's only in-predicate, replacing any previous one.
  pub fn where_in(mut self, field: ProblemField, values: Vec<String>) -> Self {
    self.one_of = Some((field, values));
    self
  }

  pub fn matches(&self, p: &ProblemRecord) -> bool {
    let eq_ok = self.equals.iter().all(|(f, v)| f.value_of(p) == v);
    let in_ok = match &self.one_of {
      Some((f, values)) => values.iter().any(|v| f.value_of(p) == v),
      None => true,
    };
    eq_ok && in_ok
  }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
  /// Longest list accepted by an in-predicate.
  fn in_list_limit(&self) -> usize;

  async fn query_problems(&self, query: &ProblemQuery) -> Result<Vec<ProblemRecord>, StoreError>;

  async fn exam_results_for_class(&self, class_id: &str) -> Result<Vec<ExamResult>, StoreError>;

  /// Batched lookup by id; unknown ids are simply absent from the result.
  async fn exam_definitions(&self, ids: &[String]) -> Result<Vec<ExamDefinition>, StoreError>;
}

/// In-process store holding a read-only snapshot of the three collections.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
  problems: Vec<ProblemRecord>,
  exam_definitions: Vec<ExamDefinition>,
  exam_results: Vec<ExamResult>,
  in_list_limit: usize,
}

impl MemoryStore {
  pub fn new(
    problems: Vec<ProblemRecord>,
    exam_definitions: Vec<ExamDefinition>,
    exam_results: Vec<ExamResult>,
    in_list_limit: usize,
  ) -> Self {
    Self { problems, exam_definitions, exam_results, in_list_limit }
  }

  pub fn problem_count(&self) -> usize {
    self.problems.len()
  }

  fn check_in_list(&self, len: usize) -> Result<(), StoreError> {
    if len > self.in_list_limit {
      return Err(StoreError::InListTooLong { len, limit: self.in_list_limit });
    }
    Ok(())
  }
}

#[async_trait]
impl DocumentStore for MemoryStore {
  fn in_list_limit(&self) -> usize {
    self.in_list_limit
  }

  #[instrument(level = "debug", skip(self, query), fields(limit = query.limit))]
  async fn query_problems(&self, query: &ProblemQuery) -> Result<Vec<ProblemRecord>, StoreError> {
    if let Some((_, values)) = &query.one_of {
      self.check_in_list(values.len())?;
    }
    let hits: Vec<ProblemRecord> = self
      .problems
      .iter()
      .filter(|p| query.matches(p))
      .take(query.limit)
      .cloned()
      .collect();
    debug!(target: "store", hits = hits.len(), "problems query");
    Ok(hits)
  }

  async fn exam_results_for_class(&self, class_id: &str) -> Result<Vec<ExamResult>, StoreError> {
    Ok(self
      .exam_results
      .iter()
      .filter(|r| r.class_id == class_id)
      .cloned()
      .collect())
  }

  async fn exam_definitions(&self, ids: &[String]) -> Result<Vec<ExamDefinition>, StoreError> {
    self.check_in_list(ids.len())?;
    Ok(self
      .exam_definitions
      .iter()
      .filter(|d| ids.contains(&d.id))
      .cloned()
      .collect())
  }
}
