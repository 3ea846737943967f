/// HTTP-level tests for the Microsoft Graph drive against a local mock server

use drive_transfer::{
    AccessToken, BrowseRequest, ChunkMessage, DriveApi, DriveConfig, DriveError, GraphDrive,
    OnlineDrive, PageRequest, RemoteEntry, TransferConfig,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;

const SITE_ID: &str = "contoso.sharepoint.com,1111,2222";

fn token() -> AccessToken {
    AccessToken::new("graph-token").unwrap()
}

fn online(server: &ServerGuard, max_total_size: u64) -> OnlineDrive<GraphDrive> {
    let config = DriveConfig::new(TransferConfig::new(max_total_size).with_chunk_size(4));
    OnlineDrive::new(Arc::new(GraphDrive::with_base_url(server.url())), config).unwrap()
}

#[tokio::test]
async fn test_browse_resolves_site_and_folder() {
    let mut server = Server::new_async().await;

    let sites = server
        .mock("GET", "/sites")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("search".into(), "TeamSite".into()),
            Matcher::UrlEncoded("$top".into(), "100".into()),
        ]))
        .match_header("authorization", "Bearer graph-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"value": [
                {"id": "other", "displayName": "TeamSite Archive", "name": "archive"},
                {"id": SITE_ID, "displayName": "TeamSite", "name": "teamsite"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let root = server
        .mock("GET", format!("/sites/{}/drive/root/children", SITE_ID).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"value": [
                {"id": "F1", "name": "Shared Documents", "folder": {"childCount": 2},
                 "parentReference": {"driveId": "b!d"}}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let folder = server
        .mock("GET", "/drives/b!d/items/F1/children")
        .match_query(Matcher::UrlEncoded("$top".into(), "10".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"value": [
                {"id": "D1", "name": "report.docx", "size": 11,
                 "file": {"mimeType": "application/octet-stream"},
                 "lastModifiedDateTime": "2024-05-01T10:00:00Z",
                 "parentReference": {"driveId": "b!d"}},
                {"id": "D2", "name": "Drafts", "size": 9000, "folder": {"childCount": 0},
                 "parentReference": {"driveId": "b!d"}}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let drive = online(&server, 1024);
    let request = BrowseRequest {
        prefix: "TeamSite/Shared Documents".to_string(),
        ..Default::default()
    };
    let listing = drive.browse(&token(), &request).await.unwrap();

    sites.assert_async().await;
    root.assert_async().await;
    folder.assert_async().await;

    assert_eq!(listing.entries.len(), 2);
    assert_eq!(listing.entries[0].id, "b!d/D1");
    assert_eq!(listing.entries[0].size, Some(11));
    assert!(listing.entries[0].modified_at.is_some());
    assert!(listing.entries[1].is_container);
    assert_eq!(listing.entries[1].size, None);
    assert!(listing.is_last_page());
}

#[tokio::test]
async fn test_next_link_is_followed() {
    let mut server = Server::new_async().await;
    let next_link = format!(
        "{}/drives/b!d/items/F1/children?$skiptoken=p2",
        server.url()
    );

    let first = server
        .mock("GET", "/drives/b!d/items/F1/children")
        .match_query(Matcher::UrlEncoded("$top".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "value": [{"id": "A", "name": "a.txt", "file": {}}, {"id": "B", "name": "b.txt", "file": {}}],
                "@odata.nextLink": next_link
            })
            .to_string(),
        )
        .create_async()
        .await;

    let second = server
        .mock("GET", "/drives/b!d/items/F1/children")
        .match_query(Matcher::UrlEncoded("$skiptoken".into(), "p2".into()))
        .match_header("authorization", "Bearer graph-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"value": [{"id": "C", "name": "c.txt", "file": {}}]}).to_string())
        .create_async()
        .await;

    let graph = GraphDrive::with_base_url(server.url());
    let auth = token();

    let page = graph
        .list_children(&auth, SITE_ID, Some("b!d/F1"), &PageRequest::first(2))
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.next_token.as_deref(), Some(next_link.as_str()));

    let page = graph
        .list_children(
            &auth,
            SITE_ID,
            Some("b!d/F1"),
            &PageRequest {
                size: 2,
                token: page.next_token,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].name(), "c.txt");
    assert!(page.next_token.is_none());

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_requests_carry_user_agent() {
    let mut server = Server::new_async().await;
    let sites = server
        .mock("GET", "/sites")
        .match_query(Matcher::Any)
        .match_header("user-agent", Matcher::Regex("^drive-transfer/".to_string()))
        .expect(2)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"value": []}).to_string())
        .create_async()
        .await;

    for graph in [
        GraphDrive::with_base_url(server.url()),
        GraphDrive::try_with_base_url(server.url()).unwrap(),
    ] {
        let page = graph
            .list_containers(&token(), None, &PageRequest::first(10))
            .await
            .unwrap();
        assert!(page.entries.is_empty());
    }

    sites.assert_async().await;
}

#[tokio::test]
async fn test_foreign_next_link_refused() {
    let server = Server::new_async().await;
    let graph = GraphDrive::with_base_url(server.url());

    let page = PageRequest {
        size: 10,
        token: Some("https://attacker.example/collect".to_string()),
    };
    let err = graph
        .list_containers(&token(), None, &page)
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::Transport { .. }));
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth() {
    let mut server = Server::new_async().await;
    let _sites = server
        .mock("GET", "/sites")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"error": {"code": "InvalidAuthenticationToken"}}"#)
        .create_async()
        .await;

    let drive = online(&server, 1024);
    let err = drive
        .browse(&token(), &BrowseRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_server_error_maps_to_transport() {
    let mut server = Server::new_async().await;
    let _sites = server
        .mock("GET", "/sites")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("try later")
        .create_async()
        .await;

    let drive = online(&server, 1024);
    match drive.browse(&token(), &BrowseRequest::default()).await {
        Err(DriveError::Transport { message }) => assert!(message.contains("503")),
        other => panic!("Expected Transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_download_two_step_and_chunks() {
    let mut server = Server::new_async().await;
    let download_url = format!("{}/download/xyz", server.url());

    let item = server
        .mock("GET", "/drives/b!d/items/D1")
        .match_header("authorization", "Bearer graph-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "D1",
                "name": "report.pdf",
                "size": 11,
                "file": {"mimeType": "application/octet-stream"},
                "@microsoft.graph.downloadUrl": download_url
            })
            .to_string(),
        )
        .create_async()
        .await;

    let content = server
        .mock("GET", "/download/xyz")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("hello world")
        .create_async()
        .await;

    let drive = online(&server, 1024);
    let mut sink: Vec<ChunkMessage> = Vec::new();
    let summary = drive
        .download_to(&token(), "b!d/D1", &mut sink)
        .await
        .unwrap();

    item.assert_async().await;
    content.assert_async().await;

    assert_eq!(summary.chunks, 3);
    assert_eq!(
        sink.iter().map(|c| c.payload.len()).collect::<Vec<_>>(),
        vec![4, 4, 3]
    );
    let meta = sink[2].metadata.as_ref().unwrap();
    assert_eq!(meta.file_name, "report.pdf");
    assert_eq!(meta.mime_type, "application/pdf");
}

#[tokio::test]
async fn test_download_over_limit_rejected() {
    let mut server = Server::new_async().await;
    let download_url = format!("{}/download/big", server.url());

    let _item = server
        .mock("GET", "/drives/b!d/items/BIG")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"id": "BIG", "name": "big.bin", "file": {},
                   "@microsoft.graph.downloadUrl": download_url})
            .to_string(),
        )
        .create_async()
        .await;
    let _content = server
        .mock("GET", "/download/big")
        .with_status(200)
        .with_body(vec![0u8; 17])
        .create_async()
        .await;

    let drive = online(&server, 16);
    assert!(matches!(
        drive.download(&token(), "b!d/BIG").await,
        Err(DriveError::SizeLimitExceeded {
            size: 17,
            limit: 16
        })
    ));
}

#[tokio::test]
async fn test_missing_item_not_found() {
    let mut server = Server::new_async().await;
    let _item = server
        .mock("GET", "/drives/b!d/items/GONE")
        .with_status(404)
        .create_async()
        .await;

    let drive = online(&server, 1024);
    assert!(matches!(
        drive.download(&token(), "b!d/GONE").await,
        Err(DriveError::NotFound { .. })
    ));

    // Unqualified ids cannot be addressed without their drive
    assert!(matches!(
        drive.download(&token(), "GONE").await,
        Err(DriveError::NotFound { .. })
    ));
}
