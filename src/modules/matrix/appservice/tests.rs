use super::*;
use crate::modules::identity::VirtualIdentity;
use poem::test::TestClient;

const HS_TOKEN: &str = "hs_secret";

fn setup() -> (Arc<AppserviceState>, mpsc::Receiver<RoomEvent>) {
    let (sender, receiver) = mpsc::channel(16);
    let session = Arc::new(SessionState::new(
        "!room:example.org",
        VirtualIdentity::new("mailbot", "example.org"),
    ));
    let client = Arc::new(MatrixClient::new("http://127.0.0.1:9", "as_secret").unwrap());
    let state = Arc::new(AppserviceState::new(
        HS_TOKEN,
        sender,
        IdentityMapper::new("mail_", "example.org"),
        client,
        session,
    ));
    (state, receiver)
}

fn message(body: &str) -> Value {
    json!({
        "type": "m.room.message",
        "room_id": "!room:example.org",
        "sender": "@alice:example.org",
        "event_id": "$1",
        "content": { "msgtype": "m.text", "body": body },
    })
}

#[tokio::test]
async fn transaction_events_are_queued() {
    let (state, mut receiver) = setup();
    let cli = TestClient::new(build_route(state));

    let resp = cli
        .put("/_matrix/app/v1/transactions/txn1")
        .header("Authorization", format!("Bearer {}", HS_TOKEN))
        .body_json(&json!({ "events": [message("one"), message("two")] }))
        .send()
        .await;
    resp.assert_status_is_ok();
    resp.assert_json(json!({})).await;

    assert_eq!(receiver.recv().await.unwrap().body(), Some("one"));
    assert_eq!(receiver.recv().await.unwrap().body(), Some("two"));
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn replayed_transaction_is_acknowledged_once() {
    let (state, mut receiver) = setup();
    let cli = TestClient::new(build_route(state));

    for _ in 0..2 {
        let resp = cli
            .put("/_matrix/app/v1/transactions/txn1")
            .query("access_token", &HS_TOKEN)
            .body_json(&json!({ "events": [message("once")] }))
            .send()
            .await;
        resp.assert_status_is_ok();
    }

    assert_eq!(receiver.recv().await.unwrap().body(), Some("once"));
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (state, mut receiver) = setup();
    let cli = TestClient::new(build_route(state));

    let resp = cli
        .put("/_matrix/app/v1/transactions/txn1")
        .body_json(&json!({ "events": [message("nope")] }))
        .send()
        .await;
    resp.assert_status(poem::http::StatusCode::UNAUTHORIZED);
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn wrong_token_is_forbidden() {
    let (state, _receiver) = setup();
    let cli = TestClient::new(build_route(state));

    let resp = cli
        .put("/_matrix/app/v1/transactions/txn1")
        .header("Authorization", "Bearer wrong")
        .body_json(&json!({ "events": [] }))
        .send()
        .await;
    resp.assert_status(poem::http::StatusCode::FORBIDDEN);
    resp.assert_json(json!({
        "errcode": "M_FORBIDDEN",
        "error": "Invalid homeserver access token",
    }))
    .await;
}

#[tokio::test]
async fn malformed_events_are_skipped() {
    let (state, mut receiver) = setup();
    let transaction = Transaction {
        events: vec![json!({ "content": {} }), message("kept")],
    };
    let queued = state.accept_transaction("txn9", transaction).await.unwrap();
    assert_eq!(queued, 1);
    assert_eq!(receiver.recv().await.unwrap().body(), Some("kept"));
}

#[tokio::test]
async fn unknown_users_and_rooms_are_not_found() {
    let (state, _receiver) = setup();
    let cli = TestClient::new(build_route(state));

    let resp = cli
        .get("/_matrix/app/v1/users/@alice:example.org")
        .header("Authorization", format!("Bearer {}", HS_TOKEN))
        .send()
        .await;
    resp.assert_status(poem::http::StatusCode::NOT_FOUND);

    let resp = cli
        .get("/_matrix/app/v1/rooms/%23mail:example.org")
        .header("Authorization", format!("Bearer {}", HS_TOKEN))
        .send()
        .await;
    resp.assert_status(poem::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_reports_phase_without_token() {
    let (state, _receiver) = setup();
    let cli = TestClient::new(build_route(state));

    let resp = cli.get("/api/status").send().await;
    resp.assert_status_is_ok();
    let json = resp.json().await;
    json.value().object().get("phase").assert_string("uninitialized");
    json.value()
        .object()
        .get("bot_user_id")
        .assert_string("@mailbot:example.org");
}
