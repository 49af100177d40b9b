use crate::helpers::{at, insights, page, permalink, post, threads_client, ACCESS_TOKEN};
use claims::{assert_err, assert_matches, assert_ok, assert_some_eq};
use serde_json::json;
use threads_sheets_sync::config::DateRange;
use threads_sheets_sync::error::SyncError;
use threads_sheets_sync::fetch;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn may() -> DateRange {
    DateRange::new(at(0), at(24 * 31)).unwrap()
}

#[tokio::test]
async fn list_posts_sends_the_window_and_token() {
    // Arrange
    let server = MockServer::start().await;
    let range = may();
    Mock::given(method("GET"))
        .and(path("/v1.0/me/threads"))
        .and(query_param(
            "fields",
            "id,media_type,permalink,text,timestamp",
        ))
        .and(query_param("since", range.since.timestamp().to_string()))
        .and(query_param("until", range.until.timestamp().to_string()))
        .and(query_param("limit", "100"))
        .and(query_param("access_token", ACCESS_TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(vec![post("1", at(1)), post("2", at(2))], Some("c2"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let page = assert_ok!(threads_client(&server).list_posts(&range, 250, None).await);

    // Assert
    assert_eq!(page.entries.len(), 2);
    let first = assert_ok!(&page.entries[0]);
    assert_some_eq!(first.permalink.as_deref(), permalink("1").as_str());
    assert_some_eq!(page.next_cursor, "c2".to_string());
}

#[tokio::test]
async fn a_cursor_without_a_next_link_ends_the_listing() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/threads"))
        .and(query_param("after", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "paging": { "cursors": { "before": "c0", "after": "c1" } },
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let page = assert_ok!(
        threads_client(&server)
            .list_posts(&may(), 100, Some("c1"))
            .await
    );

    // Assert
    assert!(page.entries.is_empty());
    assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn an_undecodable_entry_does_not_spoil_the_page() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/threads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "1", "timestamp": 17 },
                post("2", at(2)),
            ],
        })))
        .mount(&server)
        .await;

    // Act
    let page = assert_ok!(threads_client(&server).list_posts(&may(), 100, None).await);

    // Assert
    assert_matches!(
        &page.entries[0],
        Err(SyncError::MalformedRecord { id: Some(id), .. }) if id == "1"
    );
    assert_ok!(&page.entries[1]);
}

#[tokio::test]
async fn throttled_requests_are_retried() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/42/insights"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Application request limit reached", "code": 4 },
        })))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/42/insights"))
        .and(query_param(
            "metric",
            "views,likes,replies,reposts,quotes,shares",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(insights([120, 7, 2, 1, 0, 3])))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let insights = assert_ok!(threads_client(&server).post_insights("42").await);

    // Assert
    assert_eq!(insights.len(), 6);
    assert_eq!(insights[0].name, "views");
}

#[tokio::test]
async fn expired_tokens_fail_without_retrying() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/threads"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "Error validating access token: Session has expired",
                "type": "OAuthException",
                "code": 190,
            },
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let result = threads_client(&server).list_posts(&may(), 100, None).await;

    // Assert
    assert_matches!(assert_err!(result), SyncError::Authentication(_));
}

#[tokio::test]
async fn server_errors_give_up_after_the_retry_budget() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/threads"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    // Act
    let result = threads_client(&server).list_posts(&may(), 100, None).await;

    // Assert
    assert_matches!(assert_err!(result), SyncError::Network(_));
}

#[tokio::test]
async fn fetch_follows_cursors_and_collects_metrics() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/threads"))
        .and(query_param("after", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![
                post("1", at(1)),
                json!({
                    "id": "9",
                    "media_type": "REPOST_FACADE",
                    "permalink": permalink("9"),
                    "timestamp": "2024-05-01T00:30:00+0000",
                }),
            ],
            None,
        )))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/threads"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(vec![post("3", at(3)), post("2", at(2))], Some("p2"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    for (id, views) in [("1", 10), ("2", 20), ("3", 30)] {
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/{id}/insights")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(insights([views, 1, 0, 0, 0, 0])),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    // Act
    let report = assert_ok!(fetch::fetch_posts(&threads_client(&server), &may(), 100).await);

    // Assert
    let ids: Vec<&str> = report.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    let views: Vec<u64> = report.records.iter().map(|r| r.metrics.views).collect();
    assert_eq!(views, [10, 20, 30]);
    assert!(report.skipped.is_empty());
}
