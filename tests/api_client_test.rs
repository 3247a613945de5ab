//! Integration tests for the REST client against a mock backend.
//!
//! The client is blocking, so every call runs on `spawn_blocking`.

use inbox_relay::server::{ApiClient, ContactOutcome};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run<T, F>(server: &MockServer, token: Option<&str>, call: F) -> T
where
    F: FnOnce(ApiClient) -> T + Send + 'static,
    T: Send + 'static,
{
    let url = server.uri();
    let token = token.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(url, token).expect("client");
        call(client)
    })
    .await
    .expect("blocking task")
}

fn rooms_body() -> serde_json::Value {
    serde_json::json!([
        { "room_id": 1, "property_id": "p-1", "owner_id": 9, "title": "Loft", "image": null },
        { "room_id": 2, "property_id": "p-2", "title": "Cabin" }
    ])
}

#[tokio::test]
async fn test_list_rooms_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/room"))
        .and(header("authorization", "Bearer tok_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rooms_body()))
        .expect(1)
        .mount(&server)
        .await;

    let rooms = run(&server, Some("tok_123"), |api| api.list_rooms())
        .await
        .expect("rooms");
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].room_id, "1");
    assert_eq!(rooms[0].owner_id.as_deref(), Some("9"));
    assert_eq!(rooms[1].title.as_deref(), Some("Cabin"));
}

#[tokio::test]
async fn test_list_rooms_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/room"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = run(&server, None, |api| api.list_rooms())
        .await
        .expect_err("unauthorized");
    assert!(err.to_string().contains("401"), "{err}");
}

#[tokio::test]
async fn test_room_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/room/messages/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 1,
                "sender_id": 7,
                "sender_name": "Grace",
                "message": "Hi!",
                "created_at": "2025-03-04T10:15:00Z"
            },
            { "id": 2, "sender_id": "u1", "message": "Hello" }
        ])))
        .mount(&server)
        .await;

    let messages = run(&server, None, |api| api.room_messages("42"))
        .await
        .expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender_id, "7");
    assert_eq!(messages[0].sender_name.as_deref(), Some("Grace"));
    assert_eq!(messages[1].created_at, None);
}

#[tokio::test]
async fn test_create_room_posts_listing_and_owner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/room"))
        .and(body_json(serde_json::json!({ "property_id": "p-3", "owner_id": "u9" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    run(&server, None, |api| api.create_room("p-3", "u9"))
        .await
        .expect("created");
}

#[tokio::test]
async fn test_contact_owner_reuses_existing_room() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/room"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rooms_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/room"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = run(&server, None, |api| api.contact_owner("p-2", "u9"))
        .await
        .expect("outcome");
    let ContactOutcome::Existing(room) = outcome else {
        panic!("expected existing room, got {outcome:?}");
    };
    assert_eq!(room.room_id, "2");
}

#[tokio::test]
async fn test_contact_owner_creates_missing_room() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/room"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rooms_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/room"))
        .and(body_json(serde_json::json!({ "property_id": "p-5", "owner_id": "u9" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = run(&server, None, |api| api.contact_owner("p-5", "u9"))
        .await
        .expect("outcome");
    assert_eq!(outcome, ContactOutcome::Created);
}

#[tokio::test]
async fn test_contact_owner_creates_when_lookup_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/room"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/room"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = run(&server, None, |api| api.contact_owner("p-1", "u9"))
        .await
        .expect("outcome");
    assert_eq!(outcome, ContactOutcome::Created);
}

#[tokio::test]
async fn test_create_room_failure_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/room"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let err = run(&server, None, |api| api.create_room("p-1", "u9"))
        .await
        .expect_err("rejected");
    assert!(err.to_string().contains("422"), "{err}");
}
