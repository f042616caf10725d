mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use coderank::router;
use serde_json::Value;
use tower::ServiceExt;

async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT_LANGUAGE, "en");
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    req.body(body).expect("request build should succeed")
}

#[tokio::test]
async fn protected_routes_reject_requests_without_token() {
    let db = common::create_test_db().await;
    let app = router(common::test_state(db, false));

    let cases = [
        (Method::GET, "/me"),
        (Method::GET, "/me/xp/history"),
        (Method::GET, "/notifications"),
        (Method::GET, "/quizzes/1"),
        (Method::GET, "/ranking"),
        (Method::GET, "/ranking/champions"),
        (Method::POST, "/admin/xp/recalculate"),
    ];

    for (method, uri) in cases {
        let resp = app
            .clone()
            .oneshot(request(method, uri, None, None))
            .await
            .expect("router should respond");

        assert_eq!(
            resp.status(),
            StatusCode::UNAUTHORIZED,
            "expected UNAUTHORIZED for {uri}",
        );
        let body = json_body(resp).await;
        assert_eq!(body["error"], "Sign in to continue");
    }
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let db = common::create_test_db().await;
    let app = router(common::test_state(db, false));

    let resp = app
        .oneshot(request(Method::GET, "/me", Some("not-a-token"), None))
        .await
        .expect("router should respond");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_students() {
    let db = common::create_test_db().await;
    let student = common::create_student(&db, "ana@escola.dev").await;
    let token = common::token_for(&db, student).await;
    let app = router(common::test_state(db, false));

    let resp = app
        .oneshot(request(
            Method::POST,
            "/admin/bonus",
            Some(&token),
            Some(r#"{"emails": ["ana@escola.dev"], "amount": 100, "reason": "hack"}"#),
        ))
        .await
        .expect("router should respond");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "Only administrators can do this");
}

#[tokio::test]
async fn errors_are_localized_from_cookie() {
    let db = common::create_test_db().await;
    let app = router(common::test_state(db, false));

    let req = Request::builder()
        .method(Method::GET)
        .uri("/me")
        .header(header::COOKIE, "lang=pt-BR")
        .header(header::ACCEPT_LANGUAGE, "en")
        .body(Body::empty())
        .expect("request build should succeed");
    let resp = app.oneshot(req).await.expect("router should respond");

    let body = json_body(resp).await;
    assert_eq!(body["error"], "Faça login para continuar");
}

#[tokio::test]
async fn malformed_body_gets_details_only_when_exposed() {
    let db = common::create_test_db().await;
    let student = common::create_student(&db, "ana@escola.dev").await;
    let token = common::token_for(&db, student).await;

    for expose in [false, true] {
        let app = router(common::test_state(db.clone(), expose));
        let resp = app
            .oneshot(request(Method::POST, "/perguntas", Some(&token), Some(r#"{"title": 1}"#)))
            .await
            .expect("router should respond");

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error"], "The request is malformed");
        assert_eq!(body.get("details").is_some(), expose);
    }
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let db = common::create_test_db().await;
    let app = router(common::test_state(db, false));

    let resp = app
        .oneshot(request(Method::GET, "/nope", None, None))
        .await
        .expect("router should respond");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn generation_without_generator_is_unavailable() {
    let db = common::create_test_db().await;
    let student = common::create_student(&db, "ana@escola.dev").await;
    let token = common::token_for(&db, student).await;
    let app = router(common::test_state(db, false));

    let resp = app
        .oneshot(request(
            Method::POST,
            "/quizzes/generate",
            Some(&token),
            Some(r#"{"technology": "rust", "level": "iniciante"}"#),
        ))
        .await
        .expect("router should respond");

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn asking_a_question_shows_up_in_profile_and_ranking() {
    let db = common::create_test_db().await;
    let student = common::create_student(&db, "ana@escola.dev").await;
    let token = common::token_for(&db, student).await;
    let app = router(common::test_state(db, false));

    let resp = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/perguntas",
            Some(&token),
            Some(r#"{"title": "Traits", "body": "Quando usar dyn?"}"#),
        ))
        .await
        .expect("router should respond");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["xpAwarded"], 5);

    let resp = app
        .clone()
        .oneshot(request(Method::GET, "/me", Some(&token), None))
        .await
        .expect("router should respond");
    let body = json_body(resp).await;
    assert_eq!(body["user"]["xp"], 5);
    assert_eq!(body["progress"]["xpToNextLevel"], 5);

    let resp = app
        .oneshot(request(Method::GET, "/ranking?type=mensal&limit=5", Some(&token), None))
        .await
        .expect("router should respond");
    let body = json_body(resp).await;
    assert_eq!(body["type"], "mensal");
    assert_eq!(body["ranking"][0]["userId"], student);
    assert_eq!(body["ranking"][0]["position"], 1);
}

#[tokio::test]
async fn admin_creates_user_and_grants_bonus() {
    let db = common::create_test_db().await;
    let admin = common::create_admin(&db, "admin@escola.dev").await;
    let token = common::token_for(&db, admin).await;
    let app = router(common::test_state(db, false));

    let resp = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/admin/users",
            Some(&token),
            Some(r#"{"email": "Bia@Escola.dev", "displayName": "Bia", "accessTier": "full"}"#),
        ))
        .await
        .expect("router should respond");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let student_token = body["token"].as_str().expect("token").to_string();

    let resp = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/admin/bonus",
            Some(&token),
            Some(r#"{"emails": ["bia@escola.dev", "ghost@escola.dev"], "amount": 12, "reason": "Monitoria"}"#),
        ))
        .await
        .expect("router should respond");
    let body = json_body(resp).await;
    assert_eq!(body["granted"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["notFound"][0], "ghost@escola.dev");

    let resp = app
        .oneshot(request(Method::GET, "/notifications", Some(&student_token), None))
        .await
        .expect("router should respond");
    let body = json_body(resp).await;
    assert_eq!(body["notifications"][0]["kind"], "bonus");
    assert_eq!(body["notifications"][0]["payload"]["amount"], 12);
}
