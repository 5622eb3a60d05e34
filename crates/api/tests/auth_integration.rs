//! Integration tests for account registration, sign-in and profiles.

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{
    create_authenticated_user, get_request_with_auth, json_request, json_request_with_auth,
    parse_response_body, TestApp, TestUser,
};
use serde_json::json;

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_student_requires_verification() {
    let app = TestApp::new();
    let user = TestUser::student();

    let response = app
        .send(json_request(Method::POST, "/api/v1/auth/register", user.register_body()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert_eq!(body["requires_email_verification"], true);
    assert_eq!(body["user"]["email"], user.email);
    assert_eq!(body["user"]["role"], "student");
    assert_eq!(body["user"]["class_name"], "S3-01");
    assert!(body.get("tokens").is_none());
}

#[tokio::test]
async fn test_register_staff_forces_staff_class() {
    let app = TestApp::new();
    let mut user = TestUser::staff();
    user.class_name = Some("S1-01".to_string());

    let response = app
        .send(json_request(Method::POST, "/api/v1/auth/register", user.register_body()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert_eq!(body["user"]["role"], "staff");
    assert_eq!(body["user"]["class_name"], "Staff");
    assert_eq!(body["user"]["register_number"], "Staff");
}

#[tokio::test]
async fn test_register_rejects_wrong_domain() {
    let app = TestApp::new();
    let mut user = TestUser::student();
    user.email = "someone@gmail.com".to_string();

    let response = app
        .send(json_request(Method::POST, "/api/v1/auth/register", user.register_body()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_register_student_cannot_claim_staff_class() {
    let app = TestApp::new();
    let mut user = TestUser::student();
    user.class_name = Some("Staff".to_string());

    let response = app
        .send(json_request(Method::POST, "/api/v1/auth/register", user.register_body()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_password_mismatch() {
    let app = TestApp::new();
    let user = TestUser::student();
    let mut body = user.register_body();
    body["confirm_password"] = json!("something-else");

    let response = app
        .send(json_request(Method::POST, "/api/v1/auth/register", body))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "Passwords do not match");
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = TestApp::new();
    let user = TestUser::student();

    let first = app
        .send(json_request(Method::POST, "/api/v1/auth/register", user.register_body()))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .send(json_request(Method::POST, "/api/v1/auth/register", user.register_body()))
        .await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Login and tokens
// ============================================================================

#[tokio::test]
async fn test_login_refused_until_verified() {
    let app = TestApp::new();
    let user = TestUser::student();
    app.send(json_request(Method::POST, "/api/v1/auth/register", user.register_body()))
        .await;

    let login = json!({ "email": user.email, "password": user.password });
    let response = app
        .send(json_request(Method::POST, "/api/v1/auth/login", login.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert!(app.identity.mark_verified(&user.email));
    let response = app
        .send(json_request(Method::POST, "/api/v1/auth/login", login))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["tokens"]["token_type"], "Bearer");
    assert_eq!(body["tokens"]["expires_in"], 3600);
    assert!(body["tokens"]["access_token"].as_str().is_some());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new();
    let user = TestUser::student();
    create_authenticated_user(&app, &user).await;

    let response = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            json!({ "email": user.email, "password": "wrong-password" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let app = TestApp::new();
    let user = TestUser::student();
    create_authenticated_user(&app, &user).await;

    let response = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            json!({ "email": user.email.to_uppercase(), "password": user.password }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_issues_new_tokens() {
    let app = TestApp::new();
    let auth = create_authenticated_user(&app, &TestUser::staff()).await;

    let response = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/refresh",
            json!({ "refresh_token": auth.refresh_token }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    let access_token = body["access_token"].as_str().unwrap();

    let response = app
        .send(get_request_with_auth("/api/v1/users/me", access_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let app = TestApp::new();
    let auth = create_authenticated_user(&app, &TestUser::student()).await;

    let response = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/refresh",
            json!({ "refresh_token": auth.access_token }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Profiles
// ============================================================================

#[tokio::test]
async fn test_get_me_requires_token() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .uri("/api/v1/users/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(get_request_with_auth("/api/v1/users/me", "not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_and_update_me() {
    let app = TestApp::new();
    let user = TestUser::student();
    let auth = create_authenticated_user(&app, &user).await;

    let response = app
        .send(get_request_with_auth("/api/v1/users/me", &auth.access_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["uid"], auth.uid);
    assert_eq!(body["first_name"], user.first_name);

    let response = app
        .send(json_request_with_auth(
            Method::PUT,
            "/api/v1/users/me",
            json!({
                "first_name": "Jane",
                "last_name": "Tan",
                "class_name": "S4-02",
                "register_number": "07"
            }),
            &auth.access_token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["display_name"], "Jane Tan");
    assert_eq!(body["class_name"], "S4-02");
    assert_eq!(body["register_number"], "07");
}

#[tokio::test]
async fn test_update_me_rejects_unknown_class() {
    let app = TestApp::new();
    let auth = create_authenticated_user(&app, &TestUser::student()).await;

    let response = app
        .send(json_request_with_auth(
            Method::PUT,
            "/api/v1/users/me",
            json!({
                "first_name": "Jane",
                "last_name": "Tan",
                "class_name": "S9-99",
                "register_number": "07"
            }),
            &auth.access_token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_staff_directory_search() {
    let app = TestApp::new();
    let mut teacher = TestUser::staff();
    teacher.first_name = "Wilhelmina".to_string();
    teacher.last_name = "Ng".to_string();
    create_authenticated_user(&app, &teacher).await;
    create_authenticated_user(&app, &TestUser::staff()).await;
    let student = create_authenticated_user(&app, &TestUser::student()).await;

    let response = app
        .send(get_request_with_auth("/api/v1/users/staff", &student.access_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let response = app
        .send(get_request_with_auth(
            "/api/v1/users/staff?search=wilhelmina",
            &student.access_token,
        ))
        .await;
    let body = parse_response_body(response).await;
    let staff = body.as_array().unwrap();
    assert_eq!(staff.len(), 1);
    assert_eq!(staff[0]["name"], "Wilhelmina Ng");
    assert_eq!(staff[0]["email"], teacher.email);
}

#[tokio::test]
async fn test_profile_options_are_public() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .uri("/api/v1/users/options")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    let classes = body["class_options"].as_array().unwrap();
    assert_eq!(classes.first().unwrap(), "S1-01");
    assert_eq!(classes.last().unwrap(), "Staff");
    assert_eq!(body["register_number_options"][0], "01");
}
