//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{CurriculumScope, Difficulty, ProblemRecord, QuestionType, WeaknessEstimate};
use crate::retrieval::{QueryFailure, Selection};
use crate::taxonomy::Unit;
use crate::weakness::Diagnosis;

/// DTO for problem delivery; the question type is always resolved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemOut {
    pub id: String,
    pub content: String,
    pub major_topic: String,
    pub minor_topic: String,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_level: Option<CurriculumScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_url: Option<String>,
}

/// Convert the internal record to the public DTO.
pub fn to_out(p: &ProblemRecord) -> ProblemOut {
    ProblemOut {
        id: p.id.clone(),
        content: p.content.clone(),
        major_topic: p.major_topic.clone(),
        minor_topic: p.minor_topic.clone(),
        difficulty: p.difficulty,
        question_type: p.effective_question_type(),
        material_level: p.material_level,
        img_url: p.img_url.clone(),
        solution_url: p.solution_url.clone(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct TaxonomyOut {
    pub units: Vec<Unit>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOut {
    pub problems: Vec<ProblemOut>,
    pub total: usize,
    pub partial: bool,
    pub failed_queries: Vec<QueryFailure>,
    pub saturated_queries: Vec<String>,
}

impl From<Selection> for SelectOut {
    fn from(s: Selection) -> Self {
        SelectOut {
            total: s.problems.len(),
            partial: s.is_partial(),
            problems: s.problems.iter().map(to_out).collect(),
            failed_queries: s.failed_queries,
            saturated_queries: s.saturated_queries,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WeaknessQuery {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "classId")]
    pub class_id: String,
}

#[derive(Debug, Serialize)]
pub struct WeaknessOut {
    pub status: &'static str,
    pub estimates: Vec<WeaknessEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Diagnosis> for WeaknessOut {
    fn from(d: &Diagnosis) -> Self {
        let reason = match d {
            Diagnosis::Ready(_) => None,
            Diagnosis::NoData(r) => Some(r.describe()),
            Diagnosis::Unavailable(msg) => Some(msg.clone()),
        };
        WeaknessOut { status: d.status(), estimates: d.estimates().to_vec(), reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weakness::NoDataReason;
    use serde_json::json;

    #[test]
    fn test_problem_out_resolves_missing_question_type() {
        let p = ProblemRecord {
            id: "p1".into(),
            content: "c".into(),
            major_topic: "역학 시스템".into(),
            minor_topic: "운동과 충돌".into(),
            difficulty: Difficulty::High,
            difficulty_score: None,
            question_type: None,
            material_level: None,
            img_url: None,
            solution_url: None,
        };
        let v = serde_json::to_value(to_out(&p)).unwrap();
        assert_eq!(v["questionType"], "SELECTION");
        assert_eq!(v["difficulty"], "상");
        assert_eq!(v["majorTopic"], "역학 시스템");
        assert!(v.get("imgUrl").is_none());
    }

    #[test]
    fn test_weakness_out_shapes() {
        let ready = Diagnosis::Ready(vec![WeaknessEstimate { topic: "역학 시스템".into(), score: 50, samples: 2 }]);
        assert_eq!(
            serde_json::to_value(WeaknessOut::from(&ready)).unwrap(),
            json!({"status": "ok", "estimates": [{"topic": "역학 시스템", "score": 50, "samples": 2}]})
        );

        let none = Diagnosis::NoData(NoDataReason::TooFewSamples(4));
        let v = serde_json::to_value(WeaknessOut::from(&none)).unwrap();
        assert_eq!(v["status"], "no_data");
        assert_eq!(v["estimates"], json!([]));
        assert!(v["reason"].is_string());
    }
}
