//! Domain models: catalog problems, taxonomy filters, exams, results and estimates.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Five-level difficulty, ordered baseline < low < mid < high < killer.
/// Serialized with the catalog's Korean labels.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Difficulty {
  #[serde(rename = "기본")]
  Baseline,
  #[serde(rename = "하")]
  Low,
  #[serde(rename = "중")]
  Mid,
  #[serde(rename = "상")]
  High,
  #[serde(rename = "킬러")]
  Killer,
}

impl Difficulty {
  pub const ALL: [Difficulty; 5] = [
    Difficulty::Baseline,
    Difficulty::Low,
    Difficulty::Mid,
    Difficulty::High,
    Difficulty::Killer,
  ];

  /// 1 (baseline) ..= 5 (killer). Only used inside the weighting model.
  pub fn ordinal(self) -> u8 {
    match self {
      Difficulty::Baseline => 1,
      Difficulty::Low => 2,
      Difficulty::Mid => 3,
      Difficulty::High => 4,
      Difficulty::Killer => 5,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Baseline => "기본",
      Difficulty::Low => "하",
      Difficulty::Mid => "중",
      Difficulty::High => "상",
      Difficulty::Killer => "킬러",
    }
  }

  /// Label for a raw ingestion score. Unlisted values fall back to mid.
  pub fn from_score(score: f64) -> Self {
    if score.is_nan() {
      Difficulty::Mid
    } else if score == 0.0 {
      Difficulty::Baseline
    } else if score == 1.0 {
      Difficulty::Low
    } else if score == 1.5 {
      Difficulty::Mid
    } else if score == 2.0 || score == 2.5 {
      Difficulty::High
    } else if score >= 3.0 {
      Difficulty::Killer
    } else {
      Difficulty::Mid
    }
  }
}

impl FromStr for Difficulty {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Difficulty::ALL
      .into_iter()
      .find(|d| d.as_str() == s.trim())
      .ok_or_else(|| format!("unknown difficulty label: {s}"))
  }
}

/// Selection (multiple choice) vs. free-response.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
  Selection,
  Essay,
}

impl Default for QuestionType {
  fn default() -> Self { QuestionType::Selection }
}

/// Material level of a catalog entry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CurriculumScope {
  /// Core curriculum (textbook) material.
  #[serde(rename = "교과서")]
  Core,
  /// Supplementary / enrichment material.
  #[serde(rename = "심화")]
  Supplementary,
}

/// Immutable catalog entry as stored in the `problems` collection.
///
/// Ingested records may carry only the raw `difficultyScore`; the label is
/// then derived with [`Difficulty::from_score`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "StoredProblem")]
pub struct ProblemRecord {
  pub id: String,
  pub content: String,
  pub major_topic: String,
  pub minor_topic: String,
  pub difficulty: Difficulty,
  pub difficulty_score: Option<f64>,
  pub question_type: Option<QuestionType>,
  pub material_level: Option<CurriculumScope>,
  pub img_url: Option<String>,
  pub solution_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProblem {
  id: String,
  #[serde(default)] content: String,
  major_topic: String,
  minor_topic: String,
  #[serde(default)] difficulty: Option<Difficulty>,
  #[serde(default)] difficulty_score: Option<f64>,
  #[serde(default)] question_type: Option<QuestionType>,
  #[serde(default)] material_level: Option<CurriculumScope>,
  #[serde(default)] img_url: Option<String>,
  #[serde(default)] solution_url: Option<String>,
}

impl TryFrom<StoredProblem> for ProblemRecord {
  type Error = String;

  fn try_from(p: StoredProblem) -> Result<Self, Self::Error> {
    let difficulty = match (p.difficulty, p.difficulty_score) {
      (Some(label), _) => label,
      (None, Some(score)) => Difficulty::from_score(score),
      (None, None) => return Err(format!("problem {}: neither difficulty nor difficultyScore given", p.id)),
    };
    Ok(ProblemRecord {
      id: p.id,
      content: p.content,
      major_topic: p.major_topic,
      minor_topic: p.minor_topic,
      difficulty,
      difficulty_score: p.difficulty_score,
      question_type: p.question_type,
      material_level: p.material_level,
      img_url: p.img_url,
      solution_url: p.solution_url,
    })
  }
}

impl ProblemRecord {
  /// Untagged records count as selection questions.
  pub fn effective_question_type(&self) -> QuestionType {
    self.question_type.unwrap_or_default()
  }

  pub fn is_core_curriculum(&self) -> bool {
    self.material_level == Some(CurriculumScope::Core)
  }
}

fn both_question_types() -> BTreeSet<QuestionType> {
  BTreeSet::from([QuestionType::Selection, QuestionType::Essay])
}

/// Caller-built retrieval filter. Sets are deduplicated on deserialization.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyFilter {
  #[serde(default)] pub major_topics: BTreeSet<String>,
  #[serde(default)] pub minor_topics: BTreeSet<String>,
  #[serde(default)] pub difficulties: BTreeSet<Difficulty>,
  #[serde(default = "both_question_types")] pub question_types: BTreeSet<QuestionType>,
  #[serde(default)] pub excluded_ids: HashSet<String>,
  #[serde(default)] pub exclude_supplementary: bool,
  /// Maximum number of problems returned after shuffling.
  #[serde(default)] pub limit: Option<usize>,
}

impl Default for TaxonomyFilter {
  fn default() -> Self {
    Self {
      major_topics: BTreeSet::new(),
      minor_topics: BTreeSet::new(),
      difficulties: BTreeSet::new(),
      question_types: both_question_types(),
      excluded_ids: HashSet::new(),
      exclude_supplementary: false,
      limit: None,
    }
  }
}

impl TaxonomyFilter {
  pub fn for_major_topics<I, S>(topics: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      major_topics: topics.into_iter().map(Into::into).collect(),
      ..Self::default()
    }
  }
}

/// One problem slot of an exam, captured when the exam was created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamProblem {
  pub number: u32,
  #[serde(default)] pub problem_id: Option<String>,
  #[serde(default)] pub major_topic: Option<String>,
  #[serde(default)] pub minor_topic: Option<String>,
  /// Free-form label as captured; unknown or missing labels count as mid.
  #[serde(default)] pub difficulty: Option<String>,
}

impl ExamProblem {
  pub fn difficulty_or_default(&self) -> Difficulty {
    self
      .difficulty
      .as_deref()
      .and_then(|d| d.parse().ok())
      .unwrap_or(Difficulty::Mid)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
  pub id: String,
  #[serde(default)] pub title: String,
  #[serde(default)] pub created_at: Option<DateTime<Utc>>,
  #[serde(default)] pub problems: Vec<ExamProblem>,
}

/// One student's line on an exam result sheet.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentScore {
  pub student_id: String,
  #[serde(default)] pub student_name: String,
  #[serde(default)] pub score: f64,
  /// Correctness keyed by the in-exam problem number (decimal string).
  #[serde(default)] pub results: Option<HashMap<String, bool>>,
}

impl StudentScore {
  pub fn is_correct(&self, number: u32) -> Option<bool> {
    let results = self.results.as_ref()?;
    Some(results.get(&number.to_string()).copied().unwrap_or(false))
  }
}

/// One scored administration of one exam to one class.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
  pub id: String,
  pub class_id: String,
  #[serde(default)] pub exam_id: Option<String>,
  #[serde(default)] pub exam_title: String,
  pub date: DateTime<Utc>,
  #[serde(default)] pub scores: Vec<StudentScore>,
}

impl ExamResult {
  pub fn score_for(&self, student_id: &str) -> Option<&StudentScore> {
    self.scores.iter().find(|s| s.student_id == student_id)
  }
}

/// Per-topic mastery, weakest topics first when produced by the estimator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeaknessEstimate {
  pub topic: String,
  /// 0..=100
  pub score: u8,
  pub samples: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_difficulty_order_and_ordinals() {
    let ordinals: Vec<u8> = Difficulty::ALL.iter().map(|d| d.ordinal()).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);
    assert!(Difficulty::Baseline < Difficulty::Killer);
    assert_eq!("킬러".parse::<Difficulty>(), Ok(Difficulty::Killer));
    assert!("very hard".parse::<Difficulty>().is_err());
  }

  #[test]
  fn test_difficulty_from_score() {
    assert_eq!(Difficulty::from_score(0.0), Difficulty::Baseline);
    assert_eq!(Difficulty::from_score(1.0), Difficulty::Low);
    assert_eq!(Difficulty::from_score(1.5), Difficulty::Mid);
    assert_eq!(Difficulty::from_score(2.5), Difficulty::High);
    assert_eq!(Difficulty::from_score(4.0), Difficulty::Killer);
    assert_eq!(Difficulty::from_score(0.7), Difficulty::Mid);
    assert_eq!(Difficulty::from_score(f64::NAN), Difficulty::Mid);
  }

  #[test]
  fn test_problem_record_defaults() {
    let p: ProblemRecord = serde_json::from_value(serde_json::json!({
      "id": "p1",
      "majorTopic": "역학 시스템",
      "minorTopic": "운동과 충돌",
      "difficulty": "상"
    }))
    .unwrap();
    assert_eq!(p.effective_question_type(), QuestionType::Selection);
    assert!(!p.is_core_curriculum());
    assert_eq!(p.difficulty, Difficulty::High);
  }

  #[test]
  fn test_filter_defaults_to_both_question_types() {
    let f: TaxonomyFilter = serde_json::from_value(serde_json::json!({
      "majorTopics": ["화학 변화", "화학 변화"]
    }))
    .unwrap();
    assert_eq!(f.major_topics.len(), 1);
    assert_eq!(f.question_types.len(), 2);
    assert!(f.difficulties.is_empty());
    assert_eq!(f, TaxonomyFilter::for_major_topics(["화학 변화"]));
  }

  #[test]
  fn test_student_score_correctness() {
    let score = StudentScore {
      student_id: "s1".into(),
      student_name: String::new(),
      score: 0.0,
      results: Some(HashMap::from([("1".to_string(), true), ("2".to_string(), false)])),
    };
    assert_eq!(score.is_correct(1), Some(true));
    assert_eq!(score.is_correct(2), Some(false));
    assert_eq!(score.is_correct(3), Some(false));

    let no_map = StudentScore { results: None, ..score };
    assert_eq!(no_map.is_correct(1), None);
  }

  #[test]
  fn test_exam_problem_difficulty_fallback() {
    let mut p = ExamProblem { number: 1, problem_id: None, major_topic: None, minor_topic: None, difficulty: None };
    assert_eq!(p.difficulty_or_default(), Difficulty::Mid);
    p.difficulty = Some("기본".into());
    assert_eq!(p.difficulty_or_default(), Difficulty::Baseline);
    p.difficulty = Some("??".into());
    assert_eq!(p.difficulty_or_default(), Difficulty::Mid);
  }
}
