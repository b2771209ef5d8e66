//! Weakness estimator: per-topic mastery from a student's exam history.
//!
//! Every exam occurrence of a problem is one observation weighted by
//! recency (`exp(-λ·days)`) and by difficulty. The difficulty factor is
//! asymmetric: a correct answer counts its ordinal (killer = 5), a wrong
//! answer counts `6 - ordinal` (a missed baseline problem = 5). Observations
//! become a one-hot least-squares problem whose coefficients are the
//! weighted correctness per topic; the solve itself is delegated.
//!
//! The estimator never fails outward. Faults become `Diagnosis::Unavailable`.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::WeaknessSettings;
use crate::domain::{Difficulty, ExamDefinition, ExamResult, WeaknessEstimate};
use crate::error::{SolverError, StoreError};
use crate::regression::RegressionSolver;
use crate::store::DocumentStore;

/// One weighted (topic, correctness) sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub topic: String,
    pub correct: bool,
    pub weight: f64,
}

/// Design matrix, targets and column bookkeeping for one solve.
#[derive(Clone, Debug, PartialEq)]
pub struct RegressionProblem {
    /// Column order, sorted.
    pub topics: Vec<String>,
    /// Observations per column.
    pub samples: Vec<usize>,
    pub matrix_x: Vec<Vec<f64>>,
    pub vector_y: Vec<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoDataReason {
    /// The student has no score entry in any result of the class.
    NoResults,
    TooFewSamples(usize),
    NoActiveTopics,
}

impl NoDataReason {
    pub fn describe(&self) -> String {
        match self {
            NoDataReason::NoResults => "no exam results for this student".into(),
            NoDataReason::TooFewSamples(n) => format!("only {n} weighted samples"),
            NoDataReason::NoActiveTopics => "no topic-labelled problems in history".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Diagnosis {
    /// Weakest topics first.
    Ready(Vec<WeaknessEstimate>),
    NoData(NoDataReason),
    /// An upstream dependency failed; the reason is for logs and dashboards.
    Unavailable(String),
}

impl Diagnosis {
    /// The estimate list, empty for every outcome other than `Ready`.
    pub fn estimates(&self) -> &[WeaknessEstimate] {
        match self {
            Diagnosis::Ready(list) => list,
            _ => &[],
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Diagnosis::Ready(_) => "ok",
            Diagnosis::NoData(_) => "no_data",
            Diagnosis::Unavailable(_) => "unavailable",
        }
    }
}

#[derive(Error, Debug)]
enum EstimateFailure {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("solver: {0}")]
    Solver(#[from] SolverError),
}

/// `exp(-λ·days)`; exams dated after `now` count as today.
pub fn time_weight(age_days: f64, lambda: f64) -> f64 {
    (-lambda * age_days.max(0.0)).exp()
}

pub fn difficulty_weight(difficulty: Difficulty, correct: bool) -> f64 {
    let ordinal = f64::from(difficulty.ordinal());
    if correct {
        ordinal
    } else {
        6.0 - ordinal
    }
}

/// Distinct exam ids of `results`, newest administration first, capped.
pub fn recent_exam_ids(results: &[ExamResult], cap: usize) -> Vec<String> {
    let mut dated: Vec<&ExamResult> = results.iter().filter(|r| r.exam_id.is_some()).collect();
    dated.sort_by(|a, b| b.date.cmp(&a.date));

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for r in dated {
        if let Some(id) = &r.exam_id {
            if seen.insert(id.as_str()) {
                ids.push(id.clone());
            }
        }
    }
    if ids.len() > cap {
        warn!(target: "weakness", distinct = ids.len(), cap, "older exam definitions dropped from diagnosis");
        ids.truncate(cap);
    }
    ids
}

/// Weighted observations for `student_id` over the results whose exam
/// definition is present in `definitions`.
pub fn build_observations(
    results: &[ExamResult],
    definitions: &[ExamDefinition],
    student_id: &str,
    now: DateTime<Utc>,
    lambda: f64,
) -> Vec<Observation> {
    let by_id: HashMap<&str, &ExamDefinition> =
        definitions.iter().map(|d| (d.id.as_str(), d)).collect();

    let mut out = Vec::new();
    for result in results {
        let Some(exam) = result.exam_id.as_deref().and_then(|id| by_id.get(id)) else {
            continue;
        };
        let Some(score) = result.score_for(student_id) else {
            continue;
        };
        if score.results.is_none() {
            continue;
        }
        let age_days = (now - result.date).num_seconds() as f64 / 86_400.0;
        let recency = time_weight(age_days, lambda);

        for problem in &exam.problems {
            let Some(topic) = problem.major_topic.as_deref().filter(|t| !t.is_empty()) else {
                continue;
            };
            let correct = score.is_correct(problem.number).unwrap_or(false);
            out.push(Observation {
                topic: topic.to_string(),
                correct,
                weight: recency * difficulty_weight(problem.difficulty_or_default(), correct),
            });
        }
    }
    out
}

/// One row per observation, one column per topic: the row carries its weight
/// in its topic's column and the target is `correctness × weight`.
pub fn build_regression(observations: &[Observation]) -> RegressionProblem {
    let mut columns: BTreeMap<&str, usize> = BTreeMap::new();
    for o in observations {
        *columns.entry(o.topic.as_str()).or_default() += 1;
    }
    let index: HashMap<&str, usize> = columns.keys().enumerate().map(|(i, t)| (*t, i)).collect();

    let mut matrix_x = Vec::with_capacity(observations.len());
    let mut vector_y = Vec::with_capacity(observations.len());
    for o in observations {
        let mut row = vec![0.0; columns.len()];
        row[index[o.topic.as_str()]] = o.weight;
        matrix_x.push(row);
        vector_y.push(if o.correct { o.weight } else { 0.0 });
    }

    RegressionProblem {
        topics: columns.keys().map(|t| t.to_string()).collect(),
        samples: columns.values().copied().collect(),
        matrix_x,
        vector_y,
    }
}

/// Clip to [0,1], scale to 0..=100, round; weakest first, ties by topic.
pub fn to_estimates(problem: &RegressionProblem, weights: &[f64]) -> Result<Vec<WeaknessEstimate>, SolverError> {
    if weights.len() != problem.topics.len() {
        return Err(SolverError::Shape { expected: problem.topics.len(), got: weights.len() });
    }
    let mut out: Vec<WeaknessEstimate> = problem
        .topics
        .iter()
        .zip(&problem.samples)
        .zip(weights)
        .map(|((topic, samples), w)| {
            let clipped = if w.is_finite() { w.clamp(0.0, 1.0) } else { 0.0 };
            WeaknessEstimate {
                topic: topic.clone(),
                score: (clipped * 100.0).round() as u8,
                samples: *samples,
            }
        })
        .collect();
    out.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.topic.cmp(&b.topic)));
    Ok(out)
}

async fn with_timeout<T, E>(
    limit: std::time::Duration,
    fut: impl std::future::Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(on_timeout()),
    }
}

async fn diagnose(
    store: &dyn DocumentStore,
    solver: &dyn RegressionSolver,
    settings: &WeaknessSettings,
    student_id: &str,
    class_id: &str,
    now: DateTime<Utc>,
) -> Result<Diagnosis, EstimateFailure> {
    let store_limit = settings.store_timeout();
    let results = with_timeout(store_limit, store.exam_results_for_class(class_id), || {
        StoreError::Timeout(store_limit)
    })
    .await?;
    let results: Vec<ExamResult> = results
        .into_iter()
        .filter(|r| r.score_for(student_id).is_some())
        .collect();
    if results.is_empty() {
        return Ok(Diagnosis::NoData(NoDataReason::NoResults));
    }

    // Definitions are fetched in one in-list query.
    let cap = settings.max_exam_definitions.min(store.in_list_limit()).max(1);
    let exam_ids = recent_exam_ids(&results, cap);
    let definitions = if exam_ids.is_empty() {
        Vec::new()
    } else {
        with_timeout(store_limit, store.exam_definitions(&exam_ids), || {
            StoreError::Timeout(store_limit)
        })
        .await?
    };
    debug!(target: "weakness", results = results.len(), requested = exam_ids.len(), resolved = definitions.len(), "exam history gathered");

    let observations = build_observations(&results, &definitions, student_id, now, settings.decay_lambda);
    if observations.len() < settings.min_samples {
        return Ok(Diagnosis::NoData(NoDataReason::TooFewSamples(observations.len())));
    }
    let problem = build_regression(&observations);
    if problem.topics.is_empty() {
        return Ok(Diagnosis::NoData(NoDataReason::NoActiveTopics));
    }

    let solver_limit = settings.solver_timeout();
    let weights = with_timeout(solver_limit, solver.solve(&problem.matrix_x, &problem.vector_y), || {
        SolverError::Timeout(solver_limit)
    })
    .await?;
    Ok(Diagnosis::Ready(to_estimates(&problem, &weights)?))
}

/// Diagnose `student_id` within `class_id` as of `now`.
#[instrument(level = "info", skip(store, solver, settings), fields(solver = solver.name()))]
pub async fn estimate_weakness(
    store: &dyn DocumentStore,
    solver: &dyn RegressionSolver,
    settings: &WeaknessSettings,
    student_id: &str,
    class_id: &str,
    now: DateTime<Utc>,
) -> Diagnosis {
    match diagnose(store, solver, settings, student_id, class_id, now).await {
        Ok(d) => {
            match &d {
                Diagnosis::Ready(list) => info!(target: "weakness", topics = list.len(), "weakness estimated"),
                Diagnosis::NoData(reason) => info!(target: "weakness", reason = %reason.describe(), "not enough evidence"),
                Diagnosis::Unavailable(_) => {}
            }
            d
        }
        Err(e) => {
            error!(target: "weakness", error = %e, "weakness diagnosis unavailable");
            Diagnosis::Unavailable(e.to_string())
        }
    }
}
