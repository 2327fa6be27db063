//! End-to-end Facebook scrapes against a mock server

mod common;

use std::time::{Duration, Instant};

use feedsift::crawler::url::FacebookUrls;
use feedsift::models::StrategyOutcome;
use feedsift::parser::ContentValidator;
use feedsift::pipeline::{FacebookScraper, Politeness, ScrapeOptions, StrategyOrchestrator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{story_page, test_client};

const MESSAGE: &str = "Great coffee, friendly staff, highly recommend!";

fn scraper(server: &MockServer) -> FacebookScraper {
    FacebookScraper::new(test_client(2))
        .with_urls(FacebookUrls {
            desktop_base: server.uri(),
            mobile_base: format!("{}/m", server.uri()),
        })
        .with_orchestrator(StrategyOrchestrator::new(Politeness::none()))
}

/// Primary page embeds one story; mobile is gone; the posts view repeats it
#[tokio::test]
async fn test_example_cafe_end_to_end() {
    let mock_server = MockServer::start().await;
    let page = story_page("101", MESSAGE, 42);

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/m/example-cafe"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/example-cafe/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&mock_server)
        .await;

    let result = scraper(&mock_server)
        .scrape("https://www.facebook.com/example-cafe/", &ScrapeOptions::default())
        .await;

    assert!(result.success(), "unexpected error: {:?}", result.error);
    assert_eq!(result.identifier, "example-cafe");
    assert_eq!(result.resolved_id.as_deref(), Some("100064123456789"));
    assert_eq!(result.posts.len(), 1);

    let post = &result.posts[0];
    assert_eq!(post.id, "101");
    assert_eq!(post.content, MESSAGE);
    assert_eq!(post.like_count, 42);
    assert_eq!(post.comment_count, 3);
    assert_eq!(post.timestamp.timestamp(), 1_700_000_000);

    let profile = result.profile.as_ref().unwrap();
    assert_eq!(profile.name, "Example Cafe");
    assert_eq!(profile.follower_count, Some(2481));

    let names: Vec<&str> = result.strategies_tried.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["mobile_site", "desktop_feed", "alternate_view", "meta_fallback"]);
    assert!(matches!(result.strategies_tried[0].outcome, StrategyOutcome::Failed(_)));
    assert_eq!(result.strategies_tried[1].outcome, StrategyOutcome::Succeeded);
    assert_eq!(result.strategies_tried[2].outcome, StrategyOutcome::Empty);
    assert_eq!(result.strategies_tried[3].outcome, StrategyOutcome::Skipped);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["posts"][0]["likeCount"], 42);
    assert_eq!(json["platform"], "facebook");
}

/// Mobile markup alone fills the quota; the posts view is never requested
#[tokio::test]
async fn test_mobile_site_short_circuits() {
    let mock_server = MockServer::start().await;
    let mobile = r#"<html><body>
        <article data-ft='{"top_level_post_id":"2001"}'><div data-ft='{"tn":"*s"}'><div><span>Fresh sourdough loaves are out of the oven right now!</span></div></div></article>
        <article data-ft='{"top_level_post_id":"2002"}'><div data-ft='{"tn":"*s"}'><div><span>Live jazz every Thursday night from eight o'clock</span></div></div></article>
    </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><head></head></html>"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/m/example-cafe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(mobile))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/example-cafe/posts"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let options = ScrapeOptions {
        max_posts: 2,
        ..Default::default()
    };
    let result = scraper(&mock_server).scrape("example-cafe", &options).await;

    assert!(result.success());
    let ids: Vec<&str> = result.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["2001", "2002"]);
    assert_eq!(result.strategies_tried[2].outcome, StrategyOutcome::Skipped);
}

/// A login wall on the primary page aborts the scrape
#[tokio::test]
async fn test_primary_login_wall_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login/?next=example-cafe"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/m/example-cafe"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = scraper(&mock_server)
        .scrape("example-cafe", &ScrapeOptions::default())
        .await;

    assert!(!result.success());
    assert!(result.posts.is_empty());
    assert!(result.error.as_deref().unwrap().contains("example-cafe"));
}

/// Embedded comments come back as a tree when requested
#[tokio::test]
async fn test_embedded_comments() {
    let mock_server = MockServer::start().await;
    let page = r#"<html><head><script type="application/json">
        {"data":{"node":{"__typename":"Story","post_id":"301","message":{"text":"We are hiring baristas, apply in store today"},
          "feedback":{"display_comments":{"edges":[
            {"node":{"id":"c1","body":{"text":"Is it part time?"},"author":{"name":"Ana","url":"https://www.facebook.com/ana.silva"},"created_time":1700000100}},
            {"node":{"id":"c2","body":{"text":"Yes, weekends only"},"author":{"name":"Example Cafe"},"created_time":1700000200,"parent_comment":{"id":"c1"}}}
          ]}}}}}
    </script></head></html>"#;

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&mock_server)
        .await;

    let options = ScrapeOptions {
        max_posts: 1,
        with_comments: true,
        ..Default::default()
    };
    let result = scraper(&mock_server).scrape("example-cafe", &options).await;

    let comments = result.posts[0].comments.as_ref().expect("comments requested");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author_display_name, "Ana");
    assert_eq!(comments[0].replies.len(), 1);
    assert_eq!(comments[0].replies[0].text, "Yes, weekends only");
}

/// A stricter validator rejects everything; the scrape still succeeds with a warning
#[tokio::test]
async fn test_strict_validator_leaves_no_posts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(story_page("101", MESSAGE, 42)))
        .mount(&mock_server)
        .await;

    let validator = ContentValidator {
        min_chars: 80,
        ..Default::default()
    };
    let result = scraper(&mock_server)
        .with_validator(validator)
        .scrape("example-cafe", &ScrapeOptions::default())
        .await;

    assert!(result.success());
    assert!(result.posts.is_empty());
    assert!(result.warnings.iter().any(|w| w == "No data found"));
    assert_eq!(result.strategies_tried[1].outcome, StrategyOutcome::Empty);
    assert_eq!(result.strategies_tried[3].outcome, StrategyOutcome::Empty);
}

/// The first strategy request waits out a politeness pause after the primary fetch
#[tokio::test]
async fn test_pause_between_primary_and_mobile_fetch() {
    let mock_server = MockServer::start().await;
    let mobile = r#"<html><body>
        <article data-ft='{"top_level_post_id":"2001"}'><div data-ft='{"tn":"*s"}'><div><span>Fresh sourdough loaves are out of the oven right now!</span></div></div></article>
    </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/example-cafe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><head></head></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/m/example-cafe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(mobile))
        .expect(1)
        .mount(&mock_server)
        .await;

    let options = ScrapeOptions {
        max_posts: 1,
        ..Default::default()
    };
    let started = Instant::now();
    let result = scraper(&mock_server)
        .with_orchestrator(StrategyOrchestrator::new(Politeness { min_ms: 300, max_ms: 300 }))
        .scrape("example-cafe", &options)
        .await;

    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(result.posts.len(), 1);
    assert_eq!(result.posts[0].id, "2001");
}
