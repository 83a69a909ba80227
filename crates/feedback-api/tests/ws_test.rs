//! Integration tests for the chat and notification sockets.

mod helpers;

use helpers::{TestApp, assert_silent, connect, recv_text, rejected_status, send_text, token};

#[tokio::test]
async fn test_upgrade_rejections() {
    let app = TestApp::new();
    let addr = app.spawn_server().await;

    assert_eq!(rejected_status(addr, "/ws/chat").await, 401);
    assert_eq!(rejected_status(addr, "/ws/chat?token=").await, 401);
    assert_eq!(rejected_status(addr, "/ws/chat?token=not-a-jwt").await, 401);

    let ghost = token("ghost", "user");
    assert_eq!(
        rejected_status(addr, &format!("/ws/notifications?token={ghost}")).await,
        401
    );

    let logged_out = token("off", "user");
    assert_eq!(
        rejected_status(addr, &format!("/ws/chat?token={logged_out}")).await,
        403
    );

    let snapshot = app.state.realtime.chat_snapshot().await.unwrap();
    assert_eq!(snapshot.connections, 0);
}

#[tokio::test]
async fn test_staff_chat_waits_for_admin_open() {
    let app = TestApp::new();
    let addr = app.spawn_server().await;

    let mut staff = connect(addr, "/ws/chat", &token("s1", "staff")).await;
    let mut user = connect(addr, "/ws/chat", &token("u1", "user")).await;
    let mut admin = connect(addr, "/ws/chat", &token("a1", "admin")).await;
    app.wait_for_chat(3).await;

    let hi = r#"{"type":"msg","content":"hi","sender":"s1","role":"staff"}"#;

    send_text(&mut staff, hi).await;
    app.wait_for_rows(1).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    send_text(
        &mut admin,
        r#"{"type":"cmd","content":"open","sender":"a1","role":"admin"}"#,
    )
    .await;
    app.wait_for_gate(true).await;

    send_text(&mut staff, hi).await;

    for ws in [&mut staff, &mut user, &mut admin] {
        assert_eq!(recv_text(ws).await, hi);
    }
    for ws in [&mut user, &mut admin] {
        assert_silent(ws).await;
    }

    let rows = app.store.rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.sender_id == "s1" && r.sender_role == "staff"));
}

#[tokio::test]
async fn test_chat_identity_comes_from_token() {
    let app = TestApp::new();
    let addr = app.spawn_server().await;

    let mut user = connect(addr, "/ws/chat", &token("u1", "user")).await;
    app.wait_for_chat(1).await;

    send_text(&mut user, "this is not json").await;
    send_text(
        &mut user,
        r#"{"type":"msg","content":"hello","sender":"a1","role":"admin"}"#,
    )
    .await;

    assert_eq!(
        recv_text(&mut user).await,
        r#"{"type":"msg","content":"hello","sender":"u1","role":"user"}"#
    );

    // A user cannot open the gate.
    send_text(&mut user, r#"{"type":"cmd","content":"open"}"#).await;
    assert_eq!(
        recv_text(&mut user).await,
        r#"{"type":"cmd","content":"open","sender":"u1","role":"user"}"#
    );
    let snapshot = app.state.realtime.chat_snapshot().await.unwrap();
    assert!(!snapshot.chat_open);
}

#[tokio::test]
async fn test_disconnect_unregisters() {
    let app = TestApp::new();
    let addr = app.spawn_server().await;

    let mut user = connect(addr, "/ws/chat", &token("u1", "user")).await;
    app.wait_for_chat(1).await;

    user.close(None).await.unwrap();
    app.wait_for_chat(0).await;
}

#[tokio::test]
async fn test_trigger_reaches_only_target() {
    let app = TestApp::new();
    let addr = app.spawn_server().await;

    let mut target = connect(addr, "/ws/notifications", &token("u42", "user")).await;
    let mut bystander = connect(addr, "/ws/notifications", &token("u7", "user")).await;
    app.wait_for_notifications(2).await;

    let response = app
        .request(
            "POST",
            "/internal/notify",
            Some(serde_json::json!({"target_id": "u42", "content": "order ready"})),
        )
        .await;
    assert_eq!(response.body, serde_json::json!({"status": "sent"}));

    assert_eq!(
        recv_text(&mut target).await,
        r#"{"title":"Alert","content":"order ready","type":"info"}"#
    );
    assert_silent(&mut bystander).await;
}

#[tokio::test]
async fn test_trigger_without_content_type_still_delivers() {
    let app = TestApp::new();
    let addr = app.spawn_server().await;

    let mut target = connect(addr, "/ws/notifications", &token("u42", "user")).await;
    app.wait_for_notifications(1).await;

    let request = http::Request::builder()
        .method("POST")
        .uri("/internal/notify")
        .body(axum::body::Body::from(
            r#"{"target_id":"u42","content":"order ready"}"#,
        ))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(response.body, serde_json::json!({"status": "sent"}));
    assert_eq!(
        recv_text(&mut target).await,
        r#"{"title":"Alert","content":"order ready","type":"info"}"#
    );
}

#[tokio::test]
async fn test_newest_notification_socket_wins() {
    let app = TestApp::new();
    let addr = app.spawn_server().await;

    let mut first = connect(addr, "/ws/notifications", &token("u1", "user")).await;
    app.wait_for_notifications(1).await;
    let mut second = connect(addr, "/ws/notifications", &token("u1", "user")).await;
    app.wait_for_notifications(2).await;

    // Inbound frames on notification sockets are ignored.
    send_text(&mut first, "hello?").await;

    app.request(
        "POST",
        "/internal/notify",
        Some(serde_json::json!({
            "target_id": "u1",
            "content": "disk full",
            "title": "Storage",
            "type": "error",
        })),
    )
    .await;

    assert_eq!(
        recv_text(&mut second).await,
        r#"{"title":"Storage","content":"disk full","type":"error"}"#
    );
    assert_silent(&mut first).await;

    let snapshot = app.state.realtime.notification_snapshot().await.unwrap();
    assert_eq!(snapshot.indexed_users, 1);
}
