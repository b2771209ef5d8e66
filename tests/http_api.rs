use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use rmcontents_backend::config::{RetrievalSettings, WeaknessSettings};
use rmcontents_backend::domain::{
    Difficulty, ExamDefinition, ExamProblem, ExamResult, ProblemRecord, StudentScore,
};
use rmcontents_backend::regression::OneHotSolver;
use rmcontents_backend::routes::build_router;
use rmcontents_backend::state::AppState;
use rmcontents_backend::store::MemoryStore;
use rmcontents_backend::taxonomy::TaxonomyRegistry;

fn catalog() -> Vec<ProblemRecord> {
    (0..20)
        .map(|i| {
            let (major, minor) = if i < 10 {
                ("역학 시스템", "운동과 충돌")
            } else {
                ("화학 변화", "산화와 환원")
            };
            ProblemRecord {
                id: format!("m-{i}"),
                content: format!("problem {i}"),
                major_topic: major.into(),
                minor_topic: minor.into(),
                difficulty: Difficulty::ALL[i % 5],
                difficulty_score: None,
                question_type: None,
                material_level: None,
                img_url: None,
                solution_url: None,
            }
        })
        .collect()
}

fn exam_history() -> (Vec<ExamDefinition>, Vec<ExamResult>) {
    let slots = [("역학 시스템", "기본"), ("화학 변화", "상"), ("역학 시스템", "킬러"), ("화학 변화", "중"), ("화학 변화", "하")];
    let definition = ExamDefinition {
        id: "exam-1".into(),
        title: "단원 평가".into(),
        created_at: None,
        problems: slots
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
    let answers = [false, true, true, true, false];
    let result = ExamResult {
        id: "result-1".into(),
        class_id: "class-a".into(),
        exam_id: Some("exam-1".into()),
        exam_title: "단원 평가".into(),
        date: Utc::now(),
        scores: vec![StudentScore {
            student_id: "s1".into(),
            student_name: "학생".into(),
            score: 60.0,
            results: Some(answers.iter().enumerate().map(|(i, ok)| ((i + 1).to_string(), *ok)).collect()),
        }],
    };
    (vec![definition], vec![result])
}

fn app() -> Router {
    let (defs, results) = exam_history();
    let state = AppState {
        store: Arc::new(MemoryStore::new(catalog(), defs, results, 10)),
        solver: Arc::new(OneHotSolver),
        taxonomy: TaxonomyRegistry::builtin(),
        enforce_taxonomy: true,
        retrieval: RetrievalSettings::default(),
        weakness: WeaknessSettings::default(),
    };
    build_router(Arc::new(state))
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_select(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/problems/select")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = send(app(), get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn taxonomy_lists_both_units() {
    let (status, body) = send(app(), get("/api/v1/taxonomy")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["units"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["units"][0]["majorTopics"][4]["name"], "역학 시스템");
}

#[tokio::test]
async fn select_applies_difficulty_and_exclusions() {
    let (status, body) = send(
        app(),
        post_select(json!({
            "majorTopics": ["역학 시스템"],
            "difficulties": ["상"],
            "excludedIds": ["m-3"]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["partial"], false);
    assert_eq!(body["problems"][0]["id"], "m-8");
    assert_eq!(body["problems"][0]["questionType"], "SELECTION");
    assert_eq!(body["failedQueries"], json!([]));
}

#[tokio::test]
async fn select_respects_limit_across_majors() {
    let (status, body) = send(
        app(),
        post_select(json!({"majorTopics": ["역학 시스템", "화학 변화"], "limit": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 7);
    assert_eq!(body["problems"].as_array().map(Vec::len), Some(7));
}

#[tokio::test]
async fn select_with_no_major_topics_is_empty() {
    let (status, body) = send(app(), post_select(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["problems"], json!([]));
}

#[tokio::test]
async fn select_rejects_unknown_topic() {
    let (status, body) = send(app(), post_select(json!({"majorTopics": ["양자 역학"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("양자 역학"));
}

#[tokio::test]
async fn weakness_ranks_weakest_topic_first() {
    let (status, body) = send(app(), get("/api/v1/weakness?studentId=s1&classId=class-a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(
        body["estimates"],
        json!([
            {"topic": "역학 시스템", "score": 50, "samples": 2},
            {"topic": "화학 변화", "score": 61, "samples": 3}
        ])
    );
}

#[tokio::test]
async fn weakness_without_history_is_no_data() {
    let (status, body) = send(app(), get("/api/v1/weakness?studentId=s1&classId=class-b")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_data");
    assert_eq!(body["estimates"], json!([]));
    assert!(body["reason"].is_string());
}

#[tokio::test]
async fn select_malformed_body_is_json_error() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/problems/select")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"majorTopics": "역학 시스템""#))
        .unwrap();
    let (status, body) = send(app(), req).await;
    assert!(status.is_client_error());
    assert!(body["error"].is_string());

    let (status, body) = send(app(), post_select(json!({"majorTopics": 5}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
}
