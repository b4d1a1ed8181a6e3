mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use common::{Browser, TestApp, HOME_IP, SESSION_TTL_SECONDS};

#[tokio::test]
async fn request_without_session_cookie_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .send_empty(Browser::new(HOME_IP).request(Method::GET, "/v1/session"))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_session_id_is_forbidden() {
    let app = TestApp::spawn().await;
    let mut browser = Browser::new(HOME_IP);
    browser.session_id = Some("forged".to_string());

    let response = app
        .send_empty(browser.request(Method::GET, "/v1/session"))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn replay_from_another_ip_is_forbidden() {
    let app = TestApp::spawn().await;
    let browser = app.login_from(HOME_IP).await;

    let mut stolen = browser.clone();
    stolen.ip = "198.51.100.66".to_string();

    let response = app
        .send_empty(stolen.request(Method::GET, "/v1/session"))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // The rightful owner is unaffected
    let response = app
        .send_empty(browser.request(Method::GET, "/v1/session"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn replay_with_another_user_agent_is_forbidden() {
    let app = TestApp::spawn().await;
    let browser = app.login_from(HOME_IP).await;

    let mut stolen = browser.clone();
    stolen.user_agent = "curl/8.4.0".to_string();

    let response = app
        .send_empty(stolen.request(Method::GET, "/v1/session"))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_session_is_forbidden() {
    let app = TestApp::spawn().await;
    let browser = app.login_from(HOME_IP).await;

    app.clock.advance(Duration::seconds(SESSION_TTL_SECONDS));

    let response = app
        .send_empty(browser.request(Method::GET, "/v1/session"))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listing_marks_the_current_session() {
    let app = TestApp::spawn().await;
    let browser = app.login_from(HOME_IP).await;
    app.login_from("192.0.2.44").await;

    let response = app
        .send_empty(browser.request(Method::GET, "/v1/session"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let sessions = response.body.as_array().expect("array body");
    assert_eq!(sessions.len(), 2);

    let current: Vec<&serde_json::Value> = sessions
        .iter()
        .filter(|s| s["is_current"] == true)
        .collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["id"], browser.session_id.clone().unwrap().as_str());
    assert_eq!(current[0]["ip"], HOME_IP);
}
