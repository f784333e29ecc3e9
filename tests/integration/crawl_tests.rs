use crate::common::TempStore;
use doc_ferry::config::{Config, CrawlConfig, DeliveryConfig, ProviderConfig};
use doc_ferry::pipeline::{Ferry, Operation, OperationSummary};
use doc_ferry::store::DocumentStore;
use doc_ferry::{CrawlReport, Query, Record};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Entity documents: alice 3, bob 2, carol 1, plus dave's 5 without `update_dt`
async fn seed_profiles(store: &TempStore) {
    let mut records = Vec::new();
    for (user, count) in [("alice", 3), ("bob", 2), ("carol", 1)] {
        for i in 0..count {
            records.push(
                Record::new(format!("{}-profile-{}", user, i))
                    .with_field("user", user)
                    .with_field("update_dt", "2016-05-01T00:00:00Z"),
            );
        }
    }
    for i in 0..5 {
        records.push(Record::new(format!("dave-profile-{}", i)).with_field("user", "dave"));
    }
    store.seed(&records).await;
}

fn crawl_config(provider_url: &str, delivery_url: Option<String>) -> Config {
    Config {
        crawl: CrawlConfig {
            min_count: 2,
            ..Default::default()
        },
        provider: ProviderConfig {
            base_url: Some(provider_url.to_string()),
            token: Some("secret".to_string()),
        },
        delivery: DeliveryConfig { url: delivery_url },
        ..Default::default()
    }
}

async fn mount_rate_limit(server: &MockServer, remaining: u32) {
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "remaining": remaining })))
        .mount(server)
        .await;
}

async fn mount_items(server: &MockServer, entity: &str, ids: &[&str]) {
    let items: Vec<_> = ids
        .iter()
        .map(|id| json!({ "id": id, "payload": { "text": format!("hello from {}", entity) } }))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/entities/{}/items", entity)))
        .and(query_param("count", ids.len().to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(server)
        .await;
}

fn report(summary: OperationSummary) -> CrawlReport {
    match summary {
        OperationSummary::Crawled(report) => report,
        other => panic!("unexpected summary: {:?}", other),
    }
}

#[tokio::test]
async fn test_crawl_feeds_target_store() {
    let provider = MockServer::start().await;
    mount_rate_limit(&provider, 100).await;
    mount_items(&provider, "alice", &["a1", "a2", "a3"]).await;
    mount_items(&provider, "bob", &["b1", "b2"]).await;

    let target = TempStore::new("target.db");
    seed_profiles(&target).await;

    let ferry = Ferry::new(crawl_config(&provider.uri(), None)).unwrap();
    let summary = ferry
        .run(
            Operation::CopyStaticTweets,
            &target.url(),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let report = report(summary);
    assert_eq!(report.entities_visited, 2);
    assert_eq!(report.entities_succeeded, 2);
    assert_eq!(report.items_delivered, 5);
    assert_eq!(report.stopped_at.as_deref(), Some("carol"));

    let store = target.open();
    let item = store.get("a2").unwrap().unwrap();
    assert_eq!(item.field("user"), Some(&json!("alice")));
    assert_eq!(item.field("text"), Some(&json!("hello from alice")));

    let from_bob = store
        .query(&Query::match_all().term("user", "bob"), 0, 10)
        .await
        .unwrap();
    assert_eq!(from_bob.total_hits, 4);
}

#[tokio::test]
async fn test_crawl_retries_and_delivers_remotely() {
    let provider = MockServer::start().await;
    mount_rate_limit(&provider, 100).await;

    // First fetch of alice fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/entities/alice/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&provider)
        .await;
    mount_items(&provider, "alice", &["a1", "a2", "a3"]).await;
    mount_items(&provider, "bob", &["b1", "b2"]).await;

    let consumer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/packages"))
        .respond_with(ResponseTemplate::new(202))
        .expect(2)
        .mount(&consumer)
        .await;

    let target = TempStore::new("target.db");
    seed_profiles(&target).await;

    let config = crawl_config(&provider.uri(), Some(format!("{}/packages", consumer.uri())));
    let ferry = Ferry::new(config).unwrap();
    let report = report(
        ferry
            .copy_static_tweets(&target.url(), &CancellationToken::new())
            .await
            .unwrap(),
    );

    assert_eq!(report.entities_succeeded, 2);
    assert_eq!(report.entities_exhausted, 0);
    assert_eq!(report.items_delivered, 5);

    // Nothing was written locally
    assert!(target.open().get("a1").unwrap().is_none());

    let packages = consumer.received_requests().await.unwrap();
    let first: serde_json::Value = serde_json::from_slice(&packages[0].body).unwrap();
    assert_eq!(first["entity"], json!("alice"));
    assert_eq!(first["items"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_crawl_gives_up_after_max_trials() {
    let provider = MockServer::start().await;
    mount_rate_limit(&provider, 100).await;
    Mock::given(method("GET"))
        .and(path("/entities/alice/items"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&provider)
        .await;
    mount_items(&provider, "bob", &["b1", "b2"]).await;

    let target = TempStore::new("target.db");
    seed_profiles(&target).await;

    let ferry = Ferry::new(crawl_config(&provider.uri(), None)).unwrap();
    let report = report(
        ferry
            .copy_static_tweets(&target.url(), &CancellationToken::new())
            .await
            .unwrap(),
    );

    assert_eq!(report.entities_exhausted, 1);
    assert_eq!(report.entities_succeeded, 1);
    assert!(target.open().get("b1").unwrap().is_some());
}

#[tokio::test]
async fn test_cancelled_crawl_stops_while_rate_limited() {
    let provider = MockServer::start().await;
    mount_rate_limit(&provider, 0).await;

    let target = TempStore::new("target.db");
    seed_profiles(&target).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let ferry = Ferry::new(crawl_config(&provider.uri(), None)).unwrap();
    let report = report(ferry.copy_static_tweets(&target.url(), &cancel).await.unwrap());

    assert!(report.interrupted);
    assert_eq!(report.items_delivered, 0);
}
