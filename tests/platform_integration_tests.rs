//! GitLab platform client against a mock GitLab API.

use reposync::domain::Account;
use reposync::error::SyncError;
use reposync::platform::{GitLabPlatform, Platform};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_last_commit_returns_newest_commit_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/repository/commits"))
        .and(query_param("per_page", "1"))
        .and(query_param("page", "1"))
        .and(header("Authorization", "Bearer api-token"))
        .and(header("User-Agent", "reposync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "6104942438c14ec7bd21c6cd5bd995272b3faff6", "title": "Update README" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let platform = GitLabPlatform::new(&server.uri(), "api-token", "oauth2").unwrap();
    let head = platform.last_commit("42").await.unwrap();

    assert_eq!(head, "6104942438c14ec7bd21c6cd5bd995272b3faff6");
}

#[tokio::test]
async fn test_empty_repository_has_empty_head() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/repository/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let platform = GitLabPlatform::new(&server.uri(), "api-token", "oauth2").unwrap();

    assert_eq!(platform.last_commit("42").await.unwrap(), "");
}

#[tokio::test]
async fn test_error_status_is_platform_query_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/404/repository/commits"))
        .respond_with(ResponseTemplate::new(404).set_body_string("404 Project Not Found"))
        .mount(&server)
        .await;

    let platform = GitLabPlatform::new(&server.uri(), "api-token", "oauth2").unwrap();
    let err = platform.last_commit("404").await.unwrap_err();

    match err {
        SyncError::PlatformQueryFailure(message) => {
            assert!(message.contains("404"));
            assert!(message.contains("Project Not Found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_payload_is_platform_query_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/repository/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let platform = GitLabPlatform::new(&server.uri(), "api-token", "oauth2").unwrap();
    let err = platform.last_commit("42").await.unwrap_err();

    assert!(matches!(err, SyncError::PlatformQueryFailure(_)));
}

#[tokio::test]
async fn test_clone_url_keeps_mock_server_port() {
    let server = MockServer::start().await;
    let platform = GitLabPlatform::new(&server.uri(), "api-token", "oauth2").unwrap();
    let owner = Account::new("alice").unwrap();

    let expected = format!(
        "http://oauth2:api-token@{}/alice/model-bert.git",
        server.address()
    );
    assert_eq!(platform.clone_url(&owner, "model-bert"), expected);
}
