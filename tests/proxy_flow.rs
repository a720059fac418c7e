//! End-to-end join and balancing tests.

use std::collections::HashMap;
use std::time::Duration;

use rebalance_sdk::SideCar;

mod common;

#[tokio::test]
async fn test_round_robin_order() {
    let a = common::start_mock_backend("A").await;
    let b = common::start_mock_backend("B").await;
    let c = common::start_mock_backend("C").await;
    let proxy = common::start_proxy(common::test_config(), &[&a, &b, &c]).await;

    let client = reqwest::Client::new();
    let mut seen = Vec::new();
    for _ in 0..4 {
        let (status, body) = common::get(&client, &proxy.url("/")).await;
        assert_eq!(status, 200);
        seen.push(body);
    }

    assert_eq!(seen, vec!["A", "B", "C", "A"]);
}

#[tokio::test]
async fn test_sidecar_self_report_join() {
    let backend = common::start_mock_backend("joined").await;
    let proxy = common::start_proxy(common::test_config(), &[]).await;

    let sidecar = SideCar::new(&format!("http://{}/", proxy.addr));
    let replies = sidecar.join(&[backend.addr.port()]).await.unwrap();
    assert_eq!(replies, vec!["success join"]);

    let replies = sidecar.join(&[backend.addr.port()]).await.unwrap();
    assert_eq!(replies, vec!["already exists"]);
    assert_eq!(proxy.pool.len(), 1);

    let client = reqwest::Client::new();
    let (status, body) = common::get(&client, &proxy.url("/hello")).await;
    assert_eq!(status, 200);
    assert_eq!(body, "joined");
}

#[tokio::test]
async fn test_sidecar_join_from_config() {
    let backend = common::start_mock_backend("configured").await;
    let proxy = common::start_proxy(common::test_config(), &[]).await;

    let sidecar = SideCar::new(&format!("http://{}", proxy.addr));
    let replies = sidecar.join_from_config(&[backend.url()]).await.unwrap();
    assert_eq!(replies, vec!["success join"]);
    assert!(proxy.pool.contains(&backend.url()));
}

#[tokio::test]
async fn test_join_unreachable_service_is_rejected() {
    let proxy = common::start_proxy(common::test_config(), &[]).await;

    // Bind then drop to get a port nothing listens on.
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);

    let client = reqwest::Client::new();
    let res = client
        .get(proxy.url(&format!("/rebalance/join?port={}", port)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);

    let body: HashMap<String, String> = res.json().await.unwrap();
    assert!(body["error"].contains("cannot dial service"));
    assert!(proxy.pool.is_empty());
}

#[tokio::test]
async fn test_concurrent_joins_register_once() {
    let backend = common::start_mock_backend("one").await;
    let proxy = common::start_proxy(common::test_config(), &[]).await;

    let client = reqwest::Client::new();
    let url = proxy.url(&format!("/rebalance/join?port={}", backend.addr.port()));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let client = client.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            let res = client.get(&url).send().await.unwrap();
            (res.status().as_u16(), res.text().await.unwrap())
        }));
    }

    let mut successes = 0;
    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, 200);
        if body == "success join" {
            successes += 1;
        } else {
            assert_eq!(body, "already exists");
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(proxy.pool.len(), 1);
}

#[tokio::test]
async fn test_load_spread_across_services() {
    let a = common::start_mock_backend("A").await;
    let b = common::start_mock_backend("B").await;
    let c = common::start_mock_backend("C").await;
    let proxy = common::start_proxy(common::test_config(), &[&a, &b, &c]).await;

    let concurrency = 10;
    let requests_per_task = 30;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = proxy.url("/");
        tasks.push(tokio::spawn(async move {
            let mut bodies = Vec::new();
            for _ in 0..requests_per_task {
                let (status, body) = common::get(&client, &url).await;
                assert_eq!(status, 200);
                bodies.push(body);
            }
            bodies
        }));
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    let results = tokio::time::timeout(Duration::from_secs(30), futures_util::future::join_all(tasks))
        .await
        .expect("load test timed out");
    for bodies in results {
        for body in bodies.unwrap() {
            *counts.entry(body).or_default() += 1;
        }
    }

    let total = concurrency * requests_per_task;
    assert_eq!(counts.values().sum::<usize>(), total);
    for name in ["A", "B", "C"] {
        assert_eq!(counts[name], total / 3, "uneven share for {}", name);
    }
}
