//! services/api/tests/http_api.rs
//!
//! Drives the router end to end over the in-memory adapters.

use api_lib::config::Config;
use api_lib::web::{self, AppState};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use learning_progress_core::domain::{
    DifficultyTier, Learner, Lesson, Pathway, QuizIdentity, QuizOption, QuizQuestion,
};
use learning_progress_core::memory::{FixedClock, InMemoryCatalog, InMemoryStore};
use learning_progress_core::ProgressEngine;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct Harness {
    app: Router,
    clock: Arc<FixedClock>,
    learner_id: Uuid,
    lessons: Vec<Lesson>,
    quiz_questions: Vec<QuizQuestion>,
}

fn question(prompt: &str, correct: char) -> QuizQuestion {
    QuizQuestion {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        options: vec![
            QuizOption { letter: 'A', text: "First".to_string() },
            QuizOption { letter: 'B', text: "Second".to_string() },
            QuizOption { letter: 'C', text: "Third".to_string() },
        ],
        correct_option: correct,
        explanation: format!("The answer is {}.", correct),
    }
}

fn harness() -> Harness {
    let catalog = Arc::new(InMemoryCatalog::new());
    let learner_id = Uuid::new_v4();
    catalog.add_learner(Learner {
        id: learner_id,
        pathway: Pathway::Portfolio,
        tier: DifficultyTier::Beginner,
    });

    let lessons: Vec<Lesson> = ["Variables", "Functions", "Loops"]
        .iter()
        .enumerate()
        .map(|(i, title)| Lesson {
            id: Uuid::new_v4(),
            title: title.to_string(),
            pathway: Pathway::Portfolio,
            tier: DifficultyTier::Beginner,
            order: i as i32 + 1,
        })
        .collect();
    for lesson in &lessons {
        catalog.add_lesson(lesson.clone()).unwrap();
    }

    let quiz_questions = vec![question("Q1", 'A'), question("Q2", 'B')];
    for q in &quiz_questions {
        catalog.add_question(QuizIdentity::Lesson(lessons[0].id), q.clone());
    }
    let general = QuizIdentity::General {
        pathway: Pathway::Portfolio,
        tier: DifficultyTier::Beginner,
    };
    for i in 0..7 {
        catalog.add_question(general, question(&format!("General {}", i), 'C'));
    }

    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()));
    let config = Config::from_lookup(|key| {
        (key == "DATABASE_URL").then(|| "postgres://localhost/unused".to_string())
    })
    .unwrap();

    let engine = ProgressEngine::new(
        Arc::new(InMemoryStore::new()),
        catalog.clone(),
        catalog,
        clock.clone(),
        config.rules.clone(),
    );
    let app = web::router(Arc::new(AppState {
        engine: Arc::new(engine),
        config: Arc::new(config),
    }));

    Harness {
        app,
        clock,
        learner_id,
        lessons,
        quiz_questions,
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    learner_id: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = learner_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

#[tokio::test]
async fn requests_without_a_valid_learner_header_are_rejected() {
    let h = harness();
    let (status, _) = send(&h.app, Method::GET, "/progress", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/progress")
        .header("x-user-id", "learner-42")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completing_a_lesson_is_idempotent() {
    let h = harness();
    let uri = format!("/lessons/{}/complete", h.lessons[0].id);

    let (status, first) = send(&h.app, Method::POST, &uri, Some(h.learner_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["completed"], true);
    assert_eq!(first["xp_earned"], 25);
    assert_eq!(first["streak"], 1);
    assert_eq!(first["lessons_completed"], 1);

    let (status, second) = send(&h.app, Method::POST, &uri, Some(h.learner_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["completed"], false);
    assert_eq!(second["xp_earned"], 0);

    let (_, progress) = send(&h.app, Method::GET, "/progress", Some(h.learner_id), None).await;
    assert_eq!(progress["xp"], 25);
    assert_eq!(progress["level"], 1);
    assert_eq!(progress["lessons_completed"], 1);
    assert_eq!(progress["level_progress"]["xp_to_next_level"], 25);

    let status_uri = format!("/lessons/{}/completion", h.lessons[0].id);
    let (_, completion) = send(&h.app, Method::GET, &status_uri, Some(h.learner_id), None).await;
    assert_eq!(completion["completed"], true);
}

#[tokio::test]
async fn unknown_lessons_and_learners_are_not_found() {
    let h = harness();
    let uri = format!("/lessons/{}/complete", Uuid::new_v4());
    let (status, _) = send(&h.app, Method::POST, &uri, Some(h.learner_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.app, Method::GET, "/progress", Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn track_and_next_lesson_follow_lesson_order() {
    let h = harness();
    let (_, track) = send(&h.app, Method::GET, "/track", Some(h.learner_id), None).await;
    assert_eq!(track["pathway"], "portfolio");
    assert_eq!(track["lessons"].as_array().unwrap().len(), 3);
    assert_eq!(track["next_lesson"]["id"], json!(h.lessons[0].id));

    let uri = format!("/lessons/{}/complete", h.lessons[0].id);
    send(&h.app, Method::POST, &uri, Some(h.learner_id), None).await;

    let (_, track) = send(&h.app, Method::GET, "/track", Some(h.learner_id), None).await;
    assert_eq!(track["lessons"][0]["completed"], true);
    assert_eq!(track["next_lesson"]["id"], json!(h.lessons[1].id));

    let next_uri = format!("/lessons/{}/next", h.lessons[2].id);
    let (status, next) = send(&h.app, Method::GET, &next_uri, Some(h.learner_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(next["next_lesson"].is_null());
}

#[tokio::test]
async fn lesson_quiz_hides_the_answer_key_and_pays_on_improvement() {
    let h = harness();
    let uri = format!("/lessons/{}/quiz", h.lessons[0].id);

    let (status, quiz) = send(&h.app, Method::GET, &uri, Some(h.learner_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert!(questions[0].get("correct_option").is_none());

    let q1 = h.quiz_questions[0].id.to_string();
    let q2 = h.quiz_questions[1].id.to_string();

    let half = json!({ "answers": { q1.clone(): "A", q2.clone(): "C" } });
    let (_, result) = send(&h.app, Method::POST, &uri, Some(h.learner_id), Some(half)).await;
    assert_eq!(result["score_percent"], 50);
    assert_eq!(result["passed"], false);
    assert_eq!(result["xp_earned"], 10);
    assert_eq!(result["feedback"][1]["correct"], false);
    assert_eq!(result["feedback"][1]["explanation"], "The answer is B.");

    let full = json!({ "answers": { q1.clone(): "a", q2.clone(): "b" } });
    let (_, result) = send(&h.app, Method::POST, &uri, Some(h.learner_id), Some(full.clone())).await;
    assert_eq!(result["passed"], true);
    assert_eq!(result["xp_earned"], 10);
    assert_eq!(result["best_score"], 2);
    assert!(result["feedback"][0].get("explanation").is_none());

    let (_, repeat) = send(&h.app, Method::POST, &uri, Some(h.learner_id), Some(full)).await;
    assert_eq!(repeat["xp_earned"], 0);
    assert_eq!(repeat["xp_total"], 20);
}

#[tokio::test]
async fn malformed_quiz_answers_are_rejected() {
    let h = harness();
    let uri = format!("/lessons/{}/quiz", h.lessons[0].id);
    let q1 = h.quiz_questions[0].id.to_string();
    let q2 = h.quiz_questions[1].id.to_string();

    let bad_letter = json!({ "answers": { q1.clone(): "A", q2.clone(): "Z" } });
    let (status, _) = send(&h.app, Method::POST, &uri, Some(h.learner_id), Some(bad_letter)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = json!({ "answers": { q1: "A" } });
    let (status, _) = send(&h.app, Method::POST, &uri, Some(h.learner_id), Some(missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, progress) = send(&h.app, Method::GET, "/progress", Some(h.learner_id), None).await;
    assert_eq!(progress["xp"], 0);
}

#[tokio::test]
async fn undecodable_quiz_payloads_are_bad_requests() {
    let h = harness();
    let uri = format!("/lessons/{}/quiz", h.lessons[0].id);
    let q1 = h.quiz_questions[0].id.to_string();
    let q2 = h.quiz_questions[1].id.to_string();

    let numeric_letter = json!({ "answers": { q1: 1, q2: "B" } });
    let (status, _) = send(&h.app, Method::POST, &uri, Some(h.learner_id), Some(numeric_letter)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_key = json!({ "answers": { "question-one": "A" } });
    let (status, _) = send(&h.app, Method::POST, "/quiz", Some(h.learner_id), Some(bad_key)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_date = json!({ "lesson_id": h.lessons[1].id, "date": "next tuesday" });
    let (status, _) = send(
        &h.app,
        Method::POST,
        "/study-sessions/scheduled",
        Some(h.learner_id),
        Some(bad_date),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, progress) = send(&h.app, Method::GET, "/progress", Some(h.learner_id), None).await;
    assert_eq!(progress["xp"], 0);
}

#[tokio::test]
async fn general_quiz_draws_the_configured_number_of_questions() {
    let h = harness();
    let (status, quiz) = send(&h.app, Method::GET, "/quiz", Some(h.learner_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 5);

    let mut answers = serde_json::Map::new();
    for q in questions {
        answers.insert(q["id"].as_str().unwrap().to_string(), json!("C"));
    }
    let body = json!({ "answers": answers });
    let (status, result) = send(&h.app, Method::POST, "/quiz", Some(h.learner_id), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["total"], 5);
    assert_eq!(result["passed"], true);
    assert_eq!(result["xp_earned"], 50);
}

#[tokio::test]
async fn activity_feed_is_newest_first_and_limited() {
    let h = harness();
    let (status, _) = send(&h.app, Method::POST, "/learners", Some(h.learner_id), None).await;
    assert_eq!(status, StatusCode::OK);

    for lesson in &h.lessons {
        h.clock.advance(Duration::minutes(5));
        let uri = format!("/lessons/{}/complete", lesson.id);
        send(&h.app, Method::POST, &uri, Some(h.learner_id), None).await;
    }

    let (_, feed) = send(&h.app, Method::GET, "/activities", Some(h.learner_id), None).await;
    let activities = feed["activities"].as_array().unwrap();
    let completed: Vec<&Value> = activities
        .iter()
        .filter(|a| a["type"] == "lesson_completed")
        .map(|a| &a["lesson_id"])
        .collect();
    assert_eq!(
        completed,
        vec![&json!(h.lessons[2].id), &json!(h.lessons[1].id), &json!(h.lessons[0].id)]
    );
    assert_eq!(activities.last().unwrap()["type"], "account_created");

    let (_, feed) = send(&h.app, Method::GET, "/activities?limit=1", Some(h.learner_id), None).await;
    assert_eq!(feed["activities"].as_array().unwrap().len(), 1);

    let (status, _) = send(&h.app, Method::GET, "/activities?limit=lots", Some(h.learner_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scheduling_a_study_session_records_activity() {
    let h = harness();
    let body = json!({ "lesson_id": h.lessons[1].id, "date": "2026-03-05" });
    let (status, event) = send(
        &h.app,
        Method::POST,
        "/study-sessions/scheduled",
        Some(h.learner_id),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["type"], "study_session_scheduled");
    assert_eq!(event["xp_earned"], 0);

    let (_, progress) = send(&h.app, Method::GET, "/progress", Some(h.learner_id), None).await;
    assert_eq!(progress["xp"], 0);
}
