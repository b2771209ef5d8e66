//! Built-in demo data so the service is useful without a configured catalog.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{
  CurriculumScope, Difficulty, ExamDefinition, ExamProblem, ExamResult, ProblemRecord, QuestionType, StudentScore,
};
use crate::taxonomy::TaxonomyRegistry;

pub const DEMO_CLASS_ID: &str = "demo-class";
pub const DEMO_STUDENT_ID: &str = "demo-student";

/// One problem per (minor topic, difficulty) of the registry.
pub fn seed_problems(registry: &TaxonomyRegistry) -> Vec<ProblemRecord> {
  let mut out = Vec::new();
  let majors = registry.units().iter().flat_map(|u| u.major_topics.iter());
  for (mi, major) in majors.enumerate() {
    for (ni, minor) in major.minor_topics.iter().enumerate() {
      for difficulty in Difficulty::ALL {
        let n = out.len();
        out.push(ProblemRecord {
          id: format!("seed-{mi:02}-{ni:02}-{}", difficulty.ordinal()),
          content: format!("[{}] {} ({})", major.name, minor, difficulty.as_str()),
          major_topic: major.name.clone(),
          minor_topic: minor.clone(),
          difficulty,
          difficulty_score: None,
          question_type: Some(if n % 4 == 3 { QuestionType::Essay } else { QuestionType::Selection }),
          material_level: Some(if n % 3 == 2 { CurriculumScope::Supplementary } else { CurriculumScope::Core }),
          img_url: None,
          solution_url: None,
        });
      }
    }
  }
  out
}

/// Two weekly quizzes for the demo student, the latest one administered at `now`.
pub fn seed_exam_history(now: DateTime<Utc>) -> (Vec<ExamDefinition>, Vec<ExamResult>) {
  let quiz = |id: &str, title: &str, problems: &[(&str, &str)]| ExamDefinition {
    id: id.into(),
    title: title.into(),
    created_at: None,
    problems: problems
      .iter()
      .enumerate()
      .map(|(i, (topic, difficulty))| ExamProblem {
        number: i as u32 + 1,
        problem_id: None,
        major_topic: Some(topic.to_string()),
        minor_topic: None,
        difficulty: Some(difficulty.to_string()),
      })
      .collect(),
  };
  let definitions = vec![
    quiz("demo-quiz-1", "주간 테스트 1", &[("역학 시스템", "하"), ("역학 시스템", "중"), ("화학 변화", "중"), ("화학 변화", "상")]),
    quiz("demo-quiz-2", "주간 테스트 2", &[("역학 시스템", "상"), ("화학 변화", "기본"), ("화학 변화", "킬러"), ("생명 시스템", "중")]),
  ];

  let sheet = |id: &str, exam_id: &str, date: DateTime<Utc>, answers: &[bool]| ExamResult {
    id: id.into(),
    class_id: DEMO_CLASS_ID.into(),
    exam_id: Some(exam_id.into()),
    exam_title: String::new(),
    date,
    scores: vec![StudentScore {
      student_id: DEMO_STUDENT_ID.into(),
      student_name: "데모 학생".into(),
      score: answers.iter().filter(|a| **a).count() as f64 * 25.0,
      results: Some(answers.iter().enumerate().map(|(i, ok)| ((i + 1).to_string(), *ok)).collect()),
    }],
  };
  let results = vec![
    sheet("demo-result-1", "demo-quiz-1", now - Duration::days(7), &[true, true, false, true]),
    sheet("demo-result-2", "demo-quiz-2", now, &[false, false, true, true]),
  ];
  (definitions, results)
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[test]
  fn test_seed_catalog_covers_registry() {
    let reg = TaxonomyRegistry::builtin();
    let problems = seed_problems(&reg);
    let ids: HashSet<&str> = problems.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids.len(), problems.len());
    assert!(problems.iter().all(|p| reg.major_of(&p.minor_topic) == Some(p.major_topic.as_str())));
    assert_eq!(problems.iter().filter(|p| p.major_topic == "역학 시스템").count(), 10);
  }

  #[test]
  fn test_seed_history_has_eight_observations() {
    let (defs, results) = seed_exam_history(Utc::now());
    let total: usize = defs.iter().map(|d| d.problems.len()).sum();
    assert_eq!(total, 8);
    assert!(results.iter().all(|r| r.score_for(DEMO_STUDENT_ID).is_some()));
  }
}
