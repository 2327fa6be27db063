//! Integration tests for ResilientHttpClient using wiremock
//!
//! These tests validate retry, redirect and decoding behavior against mock
//! servers.

mod common;

use std::time::Duration;

use feedsift::crawler::fetcher::{FetchOptions, PageSource, ResilientHttpClient};
use feedsift::crawler::headers::{build_session_headers, BrowserProfile, IG_APP_ID};
use feedsift::utils::error::FetchError;
use feedsift::utils::retry::RetryPolicy;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::test_client;

/// Test successful fetch from mock server
#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Example Cafe</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let url = format!("{}/example-cafe", mock_server.uri());
    let page = client
        .fetch_page(&url, &FetchOptions::default())
        .await
        .expect("fetch should succeed");

    assert_eq!(page.status, 200);
    assert_eq!(page.attempts, 1);
    assert!(page.backoff_delays.is_empty());
    assert!(page.body.contains("Example Cafe"));
}

/// Three 429 responses then success: four attempts with growing delays
#[tokio::test]
async fn test_rate_limited_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let page = client
        .fetch_page(&format!("{}/busy", mock_server.uri()), &FetchOptions::default())
        .await
        .expect("should succeed on the fourth attempt");

    assert_eq!(page.body, "OK");
    assert_eq!(page.attempts, 4);
    assert_eq!(page.backoff_delays.len(), 3);
    assert!(page.backoff_delays.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(page.backoff_delays[0], Duration::from_millis(10));
}

/// Rate limiting that outlasts the budget surfaces as RateLimited
#[tokio::test]
async fn test_rate_limit_budget_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/always-busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(3);
    let result = client
        .fetch_page(&format!("{}/always-busy", mock_server.uri()), &FetchOptions::default())
        .await;

    assert!(matches!(result, Err(FetchError::RateLimited { attempts: 3 })));
}

/// A 400 carrying a login-shaped body is treated as rate limiting
#[tokio::test]
async fn test_login_shaped_400_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"message":"checkpoint_required","status":"fail"}"#),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client(2);
    let result = client
        .fetch_page(&format!("{}/api", mock_server.uri()), &FetchOptions::default())
        .await;

    assert!(matches!(result, Err(FetchError::RateLimited { .. })));
}

/// Test 404 does not retry
#[tokio::test]
async fn test_404_no_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let result = client
        .fetch_page(&format!("{}/missing", mock_server.uri()), &FetchOptions::default())
        .await;

    assert!(matches!(result, Err(FetchError::Status(404))));
}

/// A plain 400 is an ordinary status failure
#[tokio::test]
async fn test_plain_400_no_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let result = client
        .fetch_page(&format!("{}/bad", mock_server.uri()), &FetchOptions::default())
        .await;

    assert!(matches!(result, Err(FetchError::Status(400))));
}

/// A manual redirect to the login page is terminal and never retried
#[tokio::test]
async fn test_manual_login_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/login/?next=%2Fexample-cafe"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let options = FetchOptions::new(BrowserProfile::DesktopChrome).manual_redirects();
    let result = client
        .fetch_page(&format!("{}/example-cafe", mock_server.uri()), &options)
        .await;

    match result {
        Err(FetchError::LoginRequired { location }) => assert!(location.contains("/login/")),
        other => panic!("expected LoginRequired, got {other:?}"),
    }
}

/// With followed redirects the final URL reveals the login wall
#[tokio::test]
async fn test_followed_login_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login.php"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form>Log in</form>"))
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let result = client
        .fetch_page(&format!("{}/example-cafe", mock_server.uri()), &FetchOptions::default())
        .await;

    assert!(matches!(result, Err(FetchError::LoginRequired { .. })));
}

/// A page redirecting to itself is retried once, then reported as a loop
#[tokio::test]
async fn test_self_redirect_loop() {
    let mock_server = MockServer::start().await;
    let url = format!("{}/loop", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", url.as_str()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let options = FetchOptions::new(BrowserProfile::DesktopChrome).manual_redirects();
    let result = client.fetch_page(&url, &options).await;

    assert!(matches!(result, Err(FetchError::RedirectLoop(_))));
}

/// A redirect to a different page is followed once
#[tokio::test]
async fn test_manual_redirect_followed_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old-name"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new-name"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new-name"))
        .respond_with(ResponseTemplate::new(200).set_body_string("renamed page"))
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let options = FetchOptions::new(BrowserProfile::DesktopChrome).manual_redirects();
    let page = client
        .fetch_page(&format!("{}/old-name", mock_server.uri()), &options)
        .await
        .expect("redirect should be followed");

    assert_eq!(page.body, "renamed page");
}

/// A second hop after the followed redirect is reported as a loop
#[tokio::test]
async fn test_manual_redirect_chain_is_loop() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old-name"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new-name"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new-name"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/newer-name"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/newer-name"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = test_client(4);
    let options = FetchOptions::new(BrowserProfile::DesktopChrome).manual_redirects();
    let result = client
        .fetch_page(&format!("{}/old-name", mock_server.uri()), &options)
        .await;

    assert!(matches!(result, Err(FetchError::RedirectLoop(_))));
}

/// Unparsable URLs fail before any request is made
#[tokio::test]
async fn test_invalid_url_rejected() {
    let client = test_client(4);
    let result = client.fetch_page("not a url", &FetchOptions::default()).await;

    match result {
        Err(FetchError::InvalidUrl(message)) => assert!(message.contains("not a url")),
        other => panic!("expected InvalidUrl, got {other:?}"),
    }
}

/// An attempt exceeding the hard timeout fails with Timeout
#[tokio::test]
async fn test_hard_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&mock_server)
        .await;

    let client = ResilientHttpClient::with_config(
        1000,
        RetryPolicy::with_delays(2, 10, 100),
        Duration::from_millis(100),
        &[],
    )
    .unwrap();
    let result = client
        .fetch_page(&format!("{}/slow", mock_server.uri()), &FetchOptions::default())
        .await;

    assert!(matches!(result, Err(FetchError::Timeout(100))));
}

/// The Instagram profile sends app id and session headers
#[tokio::test]
async fn test_instagram_profile_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(header("x-ig-app-id", IG_APP_ID))
        .and(header("x-csrftoken", "tok"))
        .and(header_regex("cookie", "sessionid=sess-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(1);
    let options = FetchOptions::new(BrowserProfile::InstagramApi)
        .referer(format!("{}/examplecafe/", mock_server.uri()))
        .extra_headers(build_session_headers("sess-1", Some("tok"), None));
    let url = format!(
        "{}/api/v1/users/web_profile_info/?username=examplecafe",
        mock_server.uri()
    );

    let page = client.fetch(&url, &options).await.expect("headers should match");
    assert_eq!(page.json().unwrap(), serde_json::json!({}));
}

/// Bodies are decoded with the declared charset
#[tokio::test]
async fn test_declared_charset_decoding() {
    let mock_server = MockServer::start().await;
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("Caf\u{e9} cr\u{e8}me");

    Mock::given(method("GET"))
        .and(path("/latin"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(bytes.into_owned(), "text/html; charset=windows-1252"),
        )
        .mount(&mock_server)
        .await;

    let client = test_client(1);
    let page = client
        .fetch_page(&format!("{}/latin", mock_server.uri()), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(page.body, "Caf\u{e9} cr\u{e8}me");
}
