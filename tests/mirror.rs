mod common;

use std::time::Duration;

use httpmock::Method::POST;
use httpmock::{Mock, MockServer};

use common::TestServer;
use waiter::client::WaiterClient;
use waiter::config::{MirrorConfig, ServerConfig};
use waiter::error::WaiterError;
use waiter::interfaces::mirror::{Mirror, MirrorRecord, ALLOCATION_TOPIC, WAITING_TOPIC};
use waiter::services::mirror::{from_config, NsqMirror};

async fn wait_for_hits(mock: &Mock<'_>, count: usize) {
    for _ in 0..200 {
        if mock.hits_async().await >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn nsq_mirror_posts_records_to_topic() {
    let server = MockServer::start_async().await;
    let pub_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pub")
                .query_param("topic", ALLOCATION_TOPIC)
                .body(r#"{"id":"job-1","message":"ready"}"#);
            then.status(200).body("OK");
        })
        .await;

    let mirror = NsqMirror::new(&MirrorConfig::new(server.base_url())).unwrap();
    let record = MirrorRecord {
        id: "job-1".to_string(),
        message: Some("ready".to_string()),
    };
    mirror.publish(ALLOCATION_TOPIC, &record).await.unwrap();
    pub_mock.assert_hits(1);
}

#[tokio::test]
async fn nsq_mirror_reports_rejected_publish() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/pub");
            then.status(500).body("E_BAD_TOPIC");
        })
        .await;

    let mirror = from_config(Some(&MirrorConfig::new(format!("{}/", server.base_url())))).unwrap();
    let err = mirror
        .publish(WAITING_TOPIC, &MirrorRecord::waiting("job-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, WaiterError::MirrorFailure(message) if message.contains("waiting")));
}

#[tokio::test]
async fn daemon_mirrors_waits_and_allocations() {
    let nsqd = MockServer::start_async().await;
    let waiting_mock = nsqd
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pub")
                .query_param("topic", WAITING_TOPIC)
                .body(r#"{"id":"job-1"}"#);
            then.status(200).body("OK");
        })
        .await;
    let allocation_mock = nsqd
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pub")
                .query_param("topic", ALLOCATION_TOPIC)
                .body(r#"{"id":"job-1","message":"ready"}"#);
            then.status(200).body("OK");
        })
        .await;

    let config = ServerConfig {
        mirror: Some(MirrorConfig::new(nsqd.base_url())),
        ..ServerConfig::default()
    };
    let server = TestServer::start(config).await;
    let client = WaiterClient::new(server.base_url()).unwrap();

    let waiting = {
        let client = WaiterClient::new(server.base_url()).unwrap();
        tokio::spawn(async move { client.wait("job-1").await })
    };
    wait_for_hits(&waiting_mock, 1).await;
    client.alloc("job-1", "ready").await.unwrap();
    let response = tokio::time::timeout(Duration::from_secs(2), waiting)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(response.message, "ready");

    wait_for_hits(&allocation_mock, 1).await;
    waiting_mock.assert_hits(1);
    allocation_mock.assert_hits(1);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn unreachable_mirror_does_not_block_dispatch() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut mirror = MirrorConfig::new(dead);
    mirror.timeout_ms = 200;
    let config = ServerConfig {
        mirror: Some(mirror),
        ..ServerConfig::default()
    };
    let server = TestServer::start(config).await;
    let client = WaiterClient::new(server.base_url()).unwrap();

    client.alloc("job", "ready").await.unwrap();
    let response = tokio::time::timeout(Duration::from_secs(2), client.wait("job"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.id, "job");
    server.stop().await.unwrap();
}
