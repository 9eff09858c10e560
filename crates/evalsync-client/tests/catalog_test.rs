//! Integration tests for the catalog HTTP client

use evalsync_client::testing::ScriptedServer;
use evalsync_client::{CatalogClient, SyncError};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn lists_directories() {
    let server = ScriptedServer::start_silent().await.unwrap();
    let client = CatalogClient::new(&format!("http://{}", server.host())).unwrap();

    let dirs = client.directories().await.unwrap();
    assert_eq!(dirs, vec!["conditional", "static"]);
}

#[tokio::test]
async fn fetches_users_with_groups() {
    let server = ScriptedServer::start_silent().await.unwrap();
    let client = CatalogClient::new(&format!("http://{}", server.host())).unwrap();

    let users = client.users("conditional").await.unwrap();
    assert_eq!(users["alice"].groups, vec!["dev", "ops"]);
    assert_eq!(users["bob"].groups, vec!["dev"]);
}

#[tokio::test]
async fn unknown_scenario_surfaces_the_server_error() {
    let server = ScriptedServer::start_silent().await.unwrap();
    let client = CatalogClient::new(&format!("http://{}", server.host())).unwrap();

    let err = client.users("no-such-scenario").await.unwrap_err();
    match err {
        SyncError::Server { status, .. } => assert_eq!(status, 404),
        other => panic!("expected a server error, got {other}"),
    }
}
