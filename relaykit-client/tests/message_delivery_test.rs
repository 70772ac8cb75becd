//! Inbound message pipeline integration tests

mod common;

use common::{relayer, wait_until, MockRelay};
use relaykit_client::{EventStream, MessageEvent, RelayerEvent};
use std::time::Duration;

async fn next_message(events: &mut EventStream<RelayerEvent>) -> MessageEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("no message within 2s")
            .expect("event stream closed");
        if let RelayerEvent::Message(message) = event {
            return message;
        }
    }
}

#[tokio::test]
async fn test_push_is_acknowledged_and_delivered() {
    let relay = MockRelay::new();
    let relayer = relayer(&relay).await;
    relayer.subscribe("topic", None).await.unwrap();
    let mut events = relayer.events().stream();

    relay.push("topic", "hello");

    let message = next_message(&mut events).await;
    assert_eq!(message.topic, "topic");
    assert_eq!(message.message, "hello");
    assert_eq!(message.published_at, Some(1_700_000_000_000));
    assert_eq!(relay.acks(), vec![serde_json::json!(true)]);
}

#[tokio::test]
async fn test_duplicate_push_is_delivered_once() {
    let relay = MockRelay::new();
    let relayer = relayer(&relay).await;
    relayer.subscribe("topic", None).await.unwrap();
    let mut events = relayer.events().stream();

    relay.push("topic", "hello");
    relay.push("topic", "hello");
    relay.push("topic", "marker");

    assert_eq!(next_message(&mut events).await.message, "hello");
    assert_eq!(next_message(&mut events).await.message, "marker");

    assert_eq!(relay.acks().len(), 3);
    let mut recorded = 0;
    for _ in 0..100 {
        recorded = relayer.messages().get("topic").await.unwrap().len();
        if recorded == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(recorded, 2);
}

#[tokio::test]
async fn test_push_for_unsubscribed_topic_is_dropped() {
    let relay = MockRelay::new();
    let relayer = relayer(&relay).await;
    relayer.subscribe("topic", None).await.unwrap();
    let mut events = relayer.events().stream();

    relay.push("elsewhere", "ignored");
    relay.push("topic", "kept");

    let message = next_message(&mut events).await;
    assert_eq!((message.topic.as_str(), message.message.as_str()), ("topic", "kept"));
    assert!(relayer.messages().get("elsewhere").await.unwrap().is_empty());
    assert_eq!(relay.acks().len(), 2);
}

#[tokio::test]
async fn test_own_publish_echo_is_suppressed() {
    let relay = MockRelay::new();
    let relayer = relayer(&relay).await;
    relayer.subscribe("topic", None).await.unwrap();
    relayer.publish("topic", "mine", None).await.unwrap();
    let mut events = relayer.events().stream();

    relay.push("topic", "mine");
    relay.push("topic", "theirs");

    assert_eq!(next_message(&mut events).await.message, "theirs");
}

#[tokio::test]
async fn test_other_unsolicited_requests_are_ignored() {
    let relay = MockRelay::new();
    let relayer = relayer(&relay).await;
    relayer.subscribe("topic", None).await.unwrap();
    let mut events = relayer.events().stream();

    relay.push_raw(r#"{"jsonrpc":"2.0","id":7,"method":"irn_other","params":{"topic":"topic"}}"#);
    relay.push("topic", "real");

    assert_eq!(next_message(&mut events).await.message, "real");
    assert_eq!(relay.acks().len(), 1);
}

#[tokio::test]
async fn test_malformed_push_surfaces_error() {
    let relay = MockRelay::new();
    let relayer = relayer(&relay).await;
    let errored = relayer
        .events()
        .once(|e| matches!(e, RelayerEvent::Error(_)));

    relay.push_raw(r#"{"jsonrpc":"2.0","id":8,"method":"irn_subscription","params":{"id":"x"}}"#);

    tokio::time::timeout(Duration::from_secs(2), errored.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(relay.acks().is_empty());
}

#[tokio::test]
async fn test_disposed_relayer_delivers_nothing() {
    let relay = MockRelay::new();
    let relayer = relayer(&relay).await;
    relayer.subscribe("topic", None).await.unwrap();

    relayer.dispose().await.unwrap();
    let mut events = relayer.events().stream();
    relay.push("topic", "late");

    assert!(!wait_until(|| !relay.acks().is_empty(), Duration::from_millis(100)).await);
    assert!(tokio::time::timeout(Duration::from_millis(50), events.recv())
        .await
        .is_err());
}
