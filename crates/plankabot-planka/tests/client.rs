//! PlankaClient against a wiremock Planka server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use plankabot_core::{board::port::BoardPort, errors::Error};
use plankabot_planka::PlankaClient;

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/access-tokens"))
        .and(body_json(json!({"emailOrUsername": "user", "password": "pass"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"item": "token-123"})))
        .mount(server)
        .await;
}

async fn setup() -> (MockServer, PlankaClient) {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let client = PlankaClient::new(
        format!("{}/", server.uri()),
        "user",
        "pass",
        Duration::from_secs(5),
    )
    .unwrap();
    client.authenticate().await.unwrap();
    (server, client)
}

#[tokio::test]
async fn authenticate_returns_and_caches_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/boards"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "1", "name": "Demo"}])))
        .expect(1)
        .mount(&server)
        .await;

    let boards = client.list_boards().await.unwrap();
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0].id, "1");
    assert_eq!(boards[0].name.as_deref(), Some("Demo"));
}

#[tokio::test]
async fn rejected_login_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/access-tokens"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = PlankaClient::new(server.uri(), "user", "wrong", Duration::from_secs(5)).unwrap();
    assert!(matches!(client.authenticate().await, Err(Error::Auth(_))));
}

#[tokio::test]
async fn login_without_token_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/access-tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = PlankaClient::new(server.uri(), "user", "pass", Duration::from_secs(5)).unwrap();
    assert!(matches!(client.authenticate().await, Err(Error::Auth(_))));
}

#[tokio::test]
async fn requests_log_in_lazily() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/lists/l1/cards"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let client = PlankaClient::new(server.uri(), "user", "pass", Duration::from_secs(5)).unwrap();
    assert!(client.list_cards("l1").await.unwrap().is_empty());
}

#[tokio::test]
async fn list_boards_falls_back_to_projects() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/boards"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "p1"}],
            "included": {"boards": [{"id": "b1", "name": "Ops"}, {"id": "b2", "name": "Dev"}]}
        })))
        .mount(&server)
        .await;

    let boards = client.list_boards().await.unwrap();
    let names: Vec<_> = boards.iter().filter_map(|b| b.name.as_deref()).collect();
    assert_eq!(names, vec!["Ops", "Dev"]);
}

#[tokio::test]
async fn unauthorized_after_fallback_is_auth_error() {
    let (server, client) = setup().await;
    for p in ["/api/boards", "/api/projects"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;
    }

    assert!(matches!(client.list_boards().await, Err(Error::Auth(_))));
}

#[tokio::test]
async fn status_codes_map_to_error_taxonomy() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/lists/forbidden/cards"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no access"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/lists/broken/cards"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(1000)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/lists/gone/cards"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"code": "E_NOT_FOUND", "message": "List not found"})),
        )
        .mount(&server)
        .await;

    match client.list_cards("forbidden").await {
        Err(Error::Api(msg)) => assert!(msg.contains("forbidden") && msg.contains("no access")),
        other => panic!("unexpected: {other:?}"),
    }
    match client.list_cards("broken").await {
        Err(Error::Api(msg)) => {
            assert!(msg.starts_with("Planka API returned 500: "));
            assert!(msg.len() <= "Planka API returned 500: ".len() + 200);
        }
        other => panic!("unexpected: {other:?}"),
    }
    match client.create_card("gone", "x", "project").await {
        Err(Error::NotFound(msg)) => assert!(msg.contains("List not found")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn slow_server_is_api_timeout() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/lists/l1/cards"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client =
        PlankaClient::new(server.uri(), "user", "pass", Duration::from_millis(300)).unwrap();
    client.authenticate().await.unwrap();

    match client.list_cards("l1").await {
        Err(Error::Api(msg)) => assert_eq!(msg, "Planka API timed out"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn create_card_posts_at_top_of_list() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/lists/todo/cards"))
        .and(body_json(json!({"name": "Deploy", "type": "project", "position": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": {"id": "1573340758063187370", "name": "Deploy", "listId": "todo"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let card = client
        .create_card("todo", "Deploy", "project")
        .await
        .unwrap();
    assert_eq!(card.id, "1573340758063187370");
    assert_eq!(card.list_id.as_deref(), Some("todo"));
}

#[tokio::test]
async fn move_card_patches_list_and_position() {
    let (server, client) = setup().await;
    Mock::given(method("PATCH"))
        .and(path("/api/cards/c1"))
        .and(body_json(json!({"listId": "doing", "position": 65535.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"item": {"id": "c1"}})))
        .expect(1)
        .mount(&server)
        .await;

    let card = client.move_card("c1", "doing", 65535.0).await.unwrap();
    assert_eq!(card.id, "c1");
}

#[tokio::test]
async fn checklist_endpoints() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/cards/c1/task-lists"))
        .and(body_json(json!({
            "name": "Checklist",
            "position": 65536.0,
            "showOnFrontOfCard": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"item": {"id": "tl1", "name": "Checklist"}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/task-lists/tl1/tasks"))
        .and(body_json(json!({"name": "build", "position": 131072.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"item": {"id": "t1", "taskListId": "tl1", "name": "build"}})))
        .mount(&server)
        .await;

    let list = client.create_task_list("c1", "Checklist").await.unwrap();
    assert_eq!(list.id, "tl1");
    let task = client.create_task("tl1", "build", 131072.0).await.unwrap();
    assert_eq!(task.task_list_id.as_deref(), Some("tl1"));
}

#[tokio::test]
async fn get_card_returns_none_when_missing() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/cards/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": "E_NOT_FOUND"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cards/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": {"id": "c1", "name": "Release"},
            "included": {
                "taskLists": [{"id": "tl1", "name": "Checklist"}],
                "tasks": [{"id": "t1", "taskListId": "tl1", "name": "build", "isCompleted": true}],
                "attachments": [{"id": "a1", "name": "shot.png"}]
            }
        })))
        .mount(&server)
        .await;

    assert_eq!(client.get_card("missing").await.unwrap(), None);
    let details = client.get_card("c1").await.unwrap().unwrap();
    assert_eq!(details.card.name.as_deref(), Some("Release"));
    assert_eq!(details.tasks.len(), 1);
    assert_eq!(details.attachments[0].id, "a1");
}

#[tokio::test]
async fn attachments_upload_multipart_and_download_bytes() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/cards/c1/attachments"))
        .and(body_string_contains("name=\"type\""))
        .and(body_string_contains("name=\"file\"; filename=\"uniq.jpg\""))
        .and(body_string_contains("image/jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"item": {"id": "a1", "name": "uniq.jpg"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/attachments/a1/file"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/attachments/a2/file"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let attachment = client
        .create_attachment("c1", "uniq.jpg", b"jpeg-bytes".to_vec(), "image/jpeg")
        .await
        .unwrap();
    assert_eq!(attachment.id, "a1");

    assert_eq!(
        client.download_attachment("a1").await,
        Some(vec![0xFF, 0xD8, 0xFF])
    );
    assert_eq!(client.download_attachment("a2").await, None);
}

#[tokio::test]
async fn activity_feed_supports_before_cursor() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/boards/b1/actions"))
        .and(query_param("beforeId", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "99", "type": "createCard", "cardId": "c9", "userId": "u1",
                       "data": {"card": {"name": "Old"}, "list": {"id": "l1", "name": "Todo"}}}],
            "included": {"users": [{"id": "u1", "name": "Alice"}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/boards/b1/actions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "101", "type": "moveCard", "cardId": "c1"}],
            "included": {"users": []}
        })))
        .mount(&server)
        .await;

    let older = client.activity_feed("b1", Some("100")).await.unwrap();
    assert_eq!(older.items[0].id, "99");
    assert_eq!(older.items[0].card_name.as_deref(), Some("Old"));
    assert_eq!(older.users[0].name.as_deref(), Some("Alice"));

    let newest = client.activity_feed("b1", None).await.unwrap();
    assert_eq!(newest.items[0].id, "101");
}
