//! Integration tests for event routing: room fan-out, validation, durable
//! delivery for the primary platform and offline catch-up.

mod common;

use chat_proto::{Event, EventType};
use common::TestServer;
use std::time::Duration;

#[tokio::test]
async fn test_room_message_reaches_every_member() {
    let server = TestServer::spawn(17111, 17211)
        .await
        .expect("Failed to spawn test server");
    for id in ["alice", "bob", "carol"] {
        server.create_user(id).await.unwrap();
    }
    server.create_room("room1", "alice").await.unwrap();

    let mut bob = server.login("bob", "web", 0).await.unwrap();
    let mut carol = server.login("carol", "web", 0).await.unwrap();
    for (client, uid) in [(&mut bob, "bob"), (&mut carol, "carol")] {
        client
            .send(&Event::new(EventType::Join, uid, "room1", ""))
            .await
            .unwrap();
        client.recv_kind(EventType::Join).await.unwrap();
    }

    let mut alice = server.login("alice", "web", 0).await.unwrap();
    alice
        .send(&Event::new(EventType::Message, "alice", "room1/bob", "hi"))
        .await
        .unwrap();
    let ack = alice.recv_kind(EventType::Received).await.unwrap();
    assert!(!ack.id.is_empty());

    let own = alice.recv_kind(EventType::Message).await.unwrap();
    let to_bob = bob.recv_kind(EventType::Message).await.unwrap();
    let to_carol = carol.recv_kind(EventType::Message).await.unwrap();
    for event in [&own, &to_bob, &to_carol] {
        assert_eq!(event.id, ack.id);
        assert_eq!(event.from, "alice");
        assert_eq!(event.body, "hi");
    }

    let metrics = server.metrics().await.unwrap();
    assert!(metrics.contains("chat_published_total"));
}

#[tokio::test]
async fn test_unknown_type_is_rejected_and_stream_stays_up() {
    let server = TestServer::spawn(17112, 17212)
        .await
        .expect("Failed to spawn test server");
    server.create_user("alice").await.unwrap();
    server.create_user("bob").await.unwrap();

    let mut alice = server.login("alice", "web", 0).await.unwrap();
    let mut bob = server.login("bob", "web", 0).await.unwrap();

    alice
        .send(&Event::new(EventType::from("frobnicate"), "alice", "bob", "x"))
        .await
        .unwrap();
    let reply = alice.recv().await.unwrap();
    assert_eq!(reply.kind, EventType::Error);
    assert!(reply.body.contains("unsupported event type"));

    alice
        .send(&Event::new(EventType::Message, "alice", "bob", "still here"))
        .await
        .unwrap();
    alice.recv_kind(EventType::Received).await.unwrap();

    let delivered = bob.drain(Duration::from_millis(500)).await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].body, "still here");
}

#[tokio::test]
async fn test_primary_platform_receives_messages_sent_while_offline() {
    let server = TestServer::spawn(17113, 17213)
        .await
        .expect("Failed to spawn test server");
    server.create_user("alice").await.unwrap();
    server.create_user("bob").await.unwrap();

    let mut alice = server.login("alice", "web", 0).await.unwrap();
    for body in ["one", "two"] {
        alice
            .send(&Event::new(EventType::Message, "alice", "bob", body))
            .await
            .unwrap();
        alice.recv_kind(EventType::Received).await.unwrap();
    }

    let mut bob = server.login("bob", "mobile", 0).await.unwrap();
    let first = bob.recv_kind(EventType::Message).await.unwrap();
    let second = bob.recv_kind(EventType::Message).await.unwrap();
    assert_eq!(first.body, "one");
    assert_eq!(second.body, "two");
    bob.close().await.unwrap();

    // Acknowledged messages are not redelivered on the next login.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut bob = server.login("bob", "mobile", 0).await.unwrap();
    let replayed = bob.drain(Duration::from_millis(700)).await;
    assert!(
        replayed.iter().all(|e| e.kind != EventType::Message),
        "unexpected redelivery: {:?}",
        replayed
    );
}

#[tokio::test]
async fn test_catch_up_respects_watermark() {
    let server = TestServer::spawn(17114, 17214)
        .await
        .expect("Failed to spawn test server");
    server.create_user("alice").await.unwrap();
    server.create_user("carol").await.unwrap();

    let t = chrono::Utc::now().timestamp() - 100;
    let mut alice = server.login("alice", "web", 0).await.unwrap();
    for (body, created) in [("before", t - 10), ("at", t), ("after", t + 5)] {
        let mut event = Event::new(EventType::Message, "alice", "carol", body);
        event.created = created;
        alice.send(&event).await.unwrap();
        alice.recv_kind(EventType::Received).await.unwrap();
    }

    let mut carol = server.login("carol", "web", t).await.unwrap();
    let delivered = carol.drain(Duration::from_secs(1)).await;
    let mut bodies: Vec<&str> = delivered
        .iter()
        .filter(|e| e.kind == EventType::Message)
        .map(|e| e.body.as_str())
        .collect();
    bodies.sort();
    assert_eq!(bodies, vec!["after", "at"]);
}
