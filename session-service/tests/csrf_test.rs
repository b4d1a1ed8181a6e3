mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, CSRF_COOKIE, CSRF_HEADER, HOME_IP, PASSWORD, SESSION_COOKIE};

#[tokio::test]
async fn matching_pair_passes_and_rotates() {
    let app = TestApp::spawn().await;
    let mut browser = app.login_from(HOME_IP).await;
    let before = browser.csrf.clone().unwrap();

    let response = app
        .send_json(
            browser.request(Method::POST, "/v1/auth/token"),
            serde_json::json!({ "password": PASSWORD }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let cookies = response.set_cookies();
    let (rotated, _) = cookies.get(CSRF_COOKIE).expect("rotated csrf cookie");
    assert_ne!(rotated, &before);
    assert_eq!(response.header(CSRF_HEADER), Some(rotated.as_str()));

    browser.absorb(&response);
    assert_eq!(browser.csrf.as_deref(), Some(rotated.as_str()));
}

#[tokio::test]
async fn mismatched_header_is_forbidden() {
    let app = TestApp::spawn().await;
    let browser = app.login_from(HOME_IP).await;
    let sid = browser.session_id.clone().unwrap();
    let csrf = browser.csrf.clone().unwrap();

    let response = app
        .send_empty(
            axum::http::Request::builder()
                .method(Method::POST)
                .uri("/v1/auth/logout")
                .header("user-agent", &browser.user_agent)
                .header("x-forwarded-for", &browser.ip)
                .header(
                    "cookie",
                    format!("{}={}; {}={}", SESSION_COOKIE, sid, CSRF_COOKIE, csrf),
                )
                .header(CSRF_HEADER, "something-else"),
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(app.state.sessions.get(&sid).await.is_ok());
}

#[tokio::test]
async fn empty_pair_is_forbidden() {
    let app = TestApp::spawn().await;
    let mut browser = app.login_from(HOME_IP).await;
    browser.csrf = Some(String::new());

    let response = app
        .send_empty(browser.request(Method::POST, "/v1/auth/logout"))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_csrf_cookie_is_unauthorized() {
    let app = TestApp::spawn().await;
    let mut browser = app.login_from(HOME_IP).await;
    browser.csrf = None;

    let response = app
        .send_empty(browser.request(Method::POST, "/v1/auth/logout"))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pair_is_spent_even_when_handler_fails() {
    let app = TestApp::spawn().await;
    let mut browser = app.login_from(HOME_IP).await;
    let spent = browser.csrf.clone().unwrap();

    let response = app
        .send_json(
            browser.request(Method::POST, "/v1/auth/token"),
            serde_json::json!({ "password": "wrong" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let cookies = response.set_cookies();
    let (rotated, _) = cookies.get(CSRF_COOKIE).expect("rotated csrf cookie");
    assert_ne!(rotated, &spent);
    assert_eq!(response.header(CSRF_HEADER), Some(rotated.as_str()));

    browser.absorb(&response);
    let sid = browser.session_id.clone().unwrap();
    let stale_header = app
        .send_json(
            axum::http::Request::builder()
                .method(Method::POST)
                .uri("/v1/auth/token")
                .header("user-agent", &browser.user_agent)
                .header("x-forwarded-for", &browser.ip)
                .header(
                    "cookie",
                    format!("{}={}; {}={}", SESSION_COOKIE, sid, CSRF_COOKIE, rotated),
                )
                .header(CSRF_HEADER, &spent),
            serde_json::json!({ "password": PASSWORD }),
        )
        .await;
    assert_eq!(stale_header.status, StatusCode::FORBIDDEN);

    let fresh = app
        .send_json(
            browser.request(Method::POST, "/v1/auth/token"),
            serde_json::json!({ "password": PASSWORD }),
        )
        .await;
    assert_eq!(fresh.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_ends_session_and_clears_cookie() {
    let app = TestApp::spawn().await;
    let mut browser = app.login_from(HOME_IP).await;
    let sid = browser.session_id.clone().unwrap();

    let response = app
        .send_empty(browser.request(Method::POST, "/v1/auth/logout"))
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    let cookies = response.set_cookies();
    let (value, attrs) = cookies.get(SESSION_COOKIE).expect("cleared session cookie");
    assert!(value.is_empty());
    assert!(attrs.contains("Max-Age=0"));
    assert!(app.state.sessions.get(&sid).await.is_err());

    browser.absorb(&response);
    browser.session_id = Some(sid);
    let response = app
        .send_empty(browser.request(Method::GET, "/v1/session"))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}
