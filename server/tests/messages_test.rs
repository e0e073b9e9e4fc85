//! Integration tests for the REST message endpoints.

mod common;

use serde_json::{json, Value};

use common::{recv_json, start_test_server};

async fn send_rest(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    body: Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/messages/send", base_url))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = start_test_server().await;
    let resp = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/api/messages/conversations", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let bogus = client
        .get(format!("{}/api/messages/unread/count", server.base_url()))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(bogus.status(), 401);
    let body: Value = bogus.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_send_history_marks_read() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let base_url = server.base_url();
    let alice = server.token_for(1);
    let bob = server.token_for(2);

    for content in ["one", "two", "three"] {
        let resp = send_rest(
            &client,
            &base_url,
            &alice,
            json!({"receiverId": 2, "content": content}),
        )
        .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["senderId"], 1);
        assert_eq!(body["type"], "text");
        assert_eq!(body["isRead"], false);
    }

    let unread: i64 = client
        .get(format!("{}/api/messages/unread/count", base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread, 3);

    let page: Vec<Value> = client
        .get(format!("{}/api/messages/history/1?page=1&size=2", base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["content"], "three");
    assert_eq!(page[1]["content"], "two");

    let unread: i64 = client
        .get(format!("{}/api/messages/unread/count", base_url))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread, 0);

    // Sender's own view of the same history does not touch bob's unread state
    let page: Vec<Value> = client
        .get(format!("{}/api/messages/history/2", base_url))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page.len(), 3);
    assert_eq!(page[0]["isRead"], true);
}

#[tokio::test]
async fn test_conversations_list_latest_per_peer() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let base_url = server.base_url();

    send_rest(&client, &base_url, &server.token_for(2), json!({"receiverId": 1, "content": "from two"})).await;
    send_rest(&client, &base_url, &server.token_for(3), json!({"receiverId": 1, "content": "from three"})).await;
    send_rest(&client, &base_url, &server.token_for(1), json!({"receiverId": 2, "content": "reply"})).await;

    let conversations: Vec<Value> = client
        .get(format!("{}/api/messages/conversations", base_url))
        .bearer_auth(server.token_for(1))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0]["userId"], 2);
    assert_eq!(conversations[0]["lastMessage"], "reply");
    assert_eq!(conversations[0]["unreadCount"], 1);
    assert_eq!(conversations[1]["userId"], 3);
    assert!(conversations[1]["lastMessageTime"].is_string());
}

#[tokio::test]
async fn test_send_validation() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let token = server.token_for(1);

    let empty = send_rest(
        &client,
        &server.base_url(),
        &token,
        json!({"receiverId": 2, "content": "   "}),
    )
    .await;
    assert_eq!(empty.status(), 400);

    let media = send_rest(
        &client,
        &server.base_url(),
        &token,
        json!({"receiverId": "2", "type": "image", "mediaUrls": "[\"https://cdn.example/a.png\"]"}),
    )
    .await;
    assert_eq!(media.status(), 201);
    let body: Value = media.json().await.unwrap();
    assert_eq!(body["type"], "image");
    assert_eq!(body["receiverId"], 2);
}

#[tokio::test]
async fn test_rest_send_reaches_live_receiver() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let (_write, mut read) = server.connect_as(2).await;

    let resp = send_rest(
        &client,
        &server.base_url(),
        &server.token_for(1),
        json!({"receiverId": 2, "content": "over http"}),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();

    let delivered = recv_json(&mut read).await;
    assert_eq!(delivered["type"], "message");
    assert_eq!(delivered["id"], body["id"]);
    assert_eq!(delivered["senderId"], 1);
    assert_eq!(delivered["content"], "over http");
}
