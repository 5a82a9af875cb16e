use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use papo::{db, participants::presence, sweep, AppState};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt; // for `oneshot`

async fn setup() -> (Router, SqlitePool) {
    let db_pool = db::memory().await.unwrap();
    (papo::app(AppState { db_pool: db_pool.clone() }), db_pool)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("user", user);
    }
    let body = match body {
        Some(body) => {
            request = request.header("Content-Type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn texts(messages: &Value) -> Vec<String> {
    messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap().to_owned())
        .collect()
}

async fn join(app: &Router, name: &str) {
    let (status, _) = send(app, "POST", "/participants", None, Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (app, _) = setup().await;

    join(&app, "Ana").await;
    let body = json!({ "name": "Ana" });
    let (status, _) = send(&app, "POST", "/participants", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, participants) = send(&app, "GET", "/participants", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let participants = participants.as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["name"], "Ana");
    assert!(participants[0]["lastStatus"].is_i64());
}

#[tokio::test]
async fn invalid_registration_is_unprocessable() {
    let (app, _) = setup().await;

    for body in [json!({}), json!({ "name": "" }), json!({ "name": 7 })] {
        let (status, _) = send(&app, "POST", "/participants", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    let (_, participants) = send(&app, "GET", "/participants", None, None).await;
    assert!(participants.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_sender_is_rejected() {
    let (app, _) = setup().await;
    join(&app, "Ana").await;

    let body = json!({ "to": "Todos", "text": "oi", "type": "message" });
    let (status, _) = send(&app, "POST", "/messages", Some("Ghost"), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, messages) = send(&app, "GET", "/messages", Some("Ana"), None).await;
    assert!(messages.as_array().unwrap().iter().all(|m| m["from"] != "Ghost"));
}

#[tokio::test]
async fn public_and_private_visibility() {
    let (app, _) = setup().await;
    for name in ["Ana", "Bob", "Carol"] {
        join(&app, name).await;
    }

    let public = json!({ "to": "Todos", "text": "bom dia", "type": "message" });
    let (status, body) = send(&app, "POST", "/messages", Some("Ana"), Some(public)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, Value::Null);
    let private = json!({ "to": "Bob", "text": "psst", "type": "private_message" });
    let (status, _) = send(&app, "POST", "/messages", Some("Ana"), Some(private)).await;
    assert_eq!(status, StatusCode::CREATED);

    for requester in ["Ana", "Bob", "Carol", "Dora"] {
        let (status, messages) = send(&app, "GET", "/messages", Some(requester), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(texts(&messages).contains(&"bom dia".to_owned()), "{requester}");
    }

    let (_, bob) = send(&app, "GET", "/messages", Some("Bob"), None).await;
    assert!(texts(&bob).contains(&"psst".to_owned()));
    let (_, ana) = send(&app, "GET", "/messages", Some("Ana"), None).await;
    assert!(texts(&ana).contains(&"psst".to_owned()));
    let (_, carol) = send(&app, "GET", "/messages", Some("Carol"), None).await;
    assert!(!texts(&carol).contains(&"psst".to_owned()));

    let first = &ana.as_array().unwrap()[0];
    assert_eq!(first["type"], "status");
    assert_eq!(first["to"], "Todos");
    assert_eq!(first["time"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn limit_returns_most_recent_in_order() {
    let (app, _) = setup().await;
    join(&app, "Ana").await;
    for text in ["um", "dois", "tres"] {
        let body = json!({ "to": "Todos", "text": text, "type": "message" });
        send(&app, "POST", "/messages", Some("Ana"), Some(body)).await;
    }

    let (status, messages) = send(&app, "GET", "/messages?limit=2", Some("Ana"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(texts(&messages), vec!["dois", "tres"]);

    let (_, all) = send(&app, "GET", "/messages?limit=nope", Some("Ana"), None).await;
    assert_eq!(all.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn repeated_limit_falls_back_to_full_history() {
    let (app, _) = setup().await;
    join(&app, "Ana").await;
    for text in ["um", "dois", "tres"] {
        let body = json!({ "to": "Todos", "text": text, "type": "message" });
        send(&app, "POST", "/messages", Some("Ana"), Some(body)).await;
    }

    let (status, messages) =
        send(&app, "GET", "/messages?limit=2&limit=3", Some("Ana"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(texts(&messages), vec!["entered the room", "um", "dois", "tres"]);
}

#[tokio::test]
async fn status_refreshes_or_is_not_found() {
    let (app, db_pool) = setup().await;
    join(&app, "Ana").await;
    let before = presence::find(&db_pool, "Ana").await.unwrap().unwrap().last_status;

    let (status, _) = send(&app, "POST", "/status", Some("Ana"), None).await;
    assert_eq!(status, StatusCode::OK);
    let after = presence::find(&db_pool, "Ana").await.unwrap().unwrap().last_status;
    assert!(after >= before);

    let (status, _) = send(&app, "POST", "/status", Some("Ghost"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", "/status", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn idle_participant_is_swept_with_one_leave_notice() {
    let (app, db_pool) = setup().await;
    join(&app, "Ana").await;
    join(&app, "Bob").await;
    sqlx::query("UPDATE participants SET last_status=0 WHERE name='Ana'")
        .execute(&db_pool)
        .await
        .unwrap();

    let now = papo::clock::now_millis();
    let evicted = sweep::sweep_once(&db_pool, now, Duration::from_secs(10)).await.unwrap();
    assert_eq!(evicted, vec!["Ana".to_owned()]);

    let (_, participants) = send(&app, "GET", "/participants", None, None).await;
    let names: Vec<&str> = participants
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Bob"]);

    let (_, messages) = send(&app, "GET", "/messages", Some("Bob"), None).await;
    let leaves: Vec<&Value> = messages
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["from"] == "Ana" && m["text"] == "left the room")
        .collect();
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0]["type"], "status");
    assert_eq!(leaves[0]["to"], "Todos");

    // Ana may post no more
    let body = json!({ "to": "Todos", "text": "ainda aqui", "type": "message" });
    let (status, _) = send(&app, "POST", "/messages", Some("Ana"), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
