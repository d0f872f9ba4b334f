#![allow(clippy::unwrap_used)]
// Integration tests for `RestClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hassbridge_api::{Credentials, Error, HistoryQuery, LogbookQuery, RestClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let creds = Credentials::long_lived(&server.uri(), SecretString::from("tok".to_string())).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), creds);
    (server, client)
}

// ── Logbook ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_logbook_with_since_and_entity() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/logbook/2026-01-01T00(%3A|:)00(%3A|:)00Z$"))
        .and(query_param("entity", "light.test"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "x" }])))
        .expect(1)
        .mount(&server)
        .await;

    let res = client
        .logbook(&LogbookQuery {
            since: Some("2026-01-01T00:00:00Z".into()),
            entity_id: Some("light.test".into()),
            ..LogbookQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(res, json!([{ "name": "x" }]));
}

#[tokio::test]
async fn test_logbook_without_since_hits_bare_path() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/logbook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let res = client.logbook(&LogbookQuery::default()).await.unwrap();
    assert_eq!(res, json!([]));
}

// ── History ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_history_minimal_response_flag() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/history/period/2026-01-01T00(%3A|:)00(%3A|:)00Z$"))
        .and(query_param("minimal_response", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[{ "s": "1" }]])))
        .expect(1)
        .mount(&server)
        .await;

    let res = client
        .history(&HistoryQuery {
            since: Some("2026-01-01T00:00:00Z".into()),
            minimal_response: true,
            ..HistoryQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(res, json!([[{ "s": "1" }]]));
}

#[tokio::test]
async fn test_history_joins_entity_filter() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/history/period"))
        .and(query_param("filter_entity_id", "light.a,sensor.b"))
        .and(query_param("end_time", "2026-01-02T00:00:00Z"))
        .and(query_param("no_attributes", "1"))
        .and(query_param("significant_changes_only", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    client
        .history(&HistoryQuery {
            entity_ids: vec!["light.a".into(), "sensor.b".into()],
            end_time: Some("2026-01-02T00:00:00Z".into()),
            no_attributes: true,
            significant_changes_only: true,
            ..HistoryQuery::default()
        })
        .await
        .unwrap();
}

// ── Error and body handling ─────────────────────────────────────────

#[tokio::test]
async fn test_not_found_carries_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/logbook"))
        .respond_with(ResponseTemplate::new(404).set_body_string("404: Not Found"))
        .mount(&server)
        .await;

    let err = client.logbook(&LogbookQuery::default()).await.unwrap_err();

    assert!(
        matches!(err, Error::Http { status: 404, .. }),
        "expected Http 404, got: {err:?}"
    );
    assert!(err.to_string().contains("404"), "got: {err}");
}

#[tokio::test]
async fn test_unauthorized_is_auth_failure() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/history/period"))
        .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
        .mount(&server)
        .await;

    let err = client.history(&HistoryQuery::default()).await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 401, .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_non_json_body_is_returned_as_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/logbook"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("plain body"),
        )
        .mount(&server)
        .await;

    let res = client.logbook(&LogbookQuery::default()).await.unwrap();
    assert_eq!(res, json!("plain body"));
}

#[tokio::test]
async fn test_reverse_proxy_prefix_is_kept() {
    let server = MockServer::start().await;
    let base = format!("{}/hass", server.uri());
    let creds = Credentials::long_lived(&base, SecretString::from("tok".to_string())).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), creds);

    Mock::given(method("GET"))
        .and(path("/hass/api/logbook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    client.logbook(&LogbookQuery::default()).await.unwrap();
}
