use crate::common::{users, visible_count, TempStore};
use doc_ferry::config::{Config, TransferConfig};
use doc_ferry::pipeline::{Ferry, Operation, OperationSummary};
use doc_ferry::store::{open_store, DocumentStore, StoreError};
use doc_ferry::{FerryError, Query, Record};
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_index(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "users": {} })))
        .mount(server)
        .await;
}

fn hits(ids: &[&str], total: u64) -> serde_json::Value {
    let hits: Vec<_> = ids
        .iter()
        .map(|id| json!({ "_id": id, "_source": { "screen_name": format!("@{}", id) } }))
        .collect();
    json!({ "hits": { "total": { "value": total }, "hits": hits } })
}

#[tokio::test]
async fn test_unreachable_index_is_a_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = open_store(&format!("{}/users", server.uri()), &Client::new()).await;

    assert!(matches!(result, Err(StoreError::Connection { .. })));
}

#[tokio::test]
async fn test_fill_from_rest_source() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({ "from": 0, "size": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["u1", "u2"], 3)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({ "from": 2, "size": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["u3"], 3)))
        .expect(1)
        .mount(&server)
        .await;

    let target = TempStore::new("target.db");
    let config = Config {
        transfer: TransferConfig {
            page_size: 2,
            commit_every: 100_000,
        },
        ..Default::default()
    };
    let ferry = Ferry::new(config).unwrap();

    let summary = ferry
        .run(
            Operation::FillFrom,
            &target.url(),
            Some(&format!("{}/users", server.uri())),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let OperationSummary::Transferred { counters, .. } = summary else {
        panic!("unexpected summary: {:?}", summary);
    };
    assert_eq!(counters.records_copied, 3);
    assert_eq!(visible_count(&target.path).await, 3);

    let record = target.open().get("u3").unwrap().unwrap();
    assert_eq!(record.field("screen_name"), Some(&json!("@u3")));
}

#[tokio::test]
async fn test_copy_users_into_rest_target() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/_bulk"))
        .and(query_param("refresh", "true"))
        .and(body_string_contains("\"_id\":\"user-004\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "errors": false, "items": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/_refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let source = TempStore::new("users.db");
    source.seed(&users(5)).await;

    let ferry = Ferry::new(Config::default()).unwrap();
    let summary = ferry
        .copy_users(
            &format!("{}/users", server.uri()),
            Some(&source.url()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        summary,
        OperationSummary::UsersCopied {
            copied: 5,
            interrupted: false
        }
    );
}

#[tokio::test]
async fn test_bulk_errors_are_reported() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": { "_id": "b", "status": 400, "error": { "type": "mapper_parsing_exception" } } }
            ]
        })))
        .mount(&server)
        .await;

    let store = open_store(&format!("{}/users", server.uri()), &Client::new())
        .await
        .unwrap();
    let result = store.update(&[Record::new("a"), Record::new("b")]).await;

    assert!(matches!(
        result,
        Err(StoreError::BulkRejected {
            failed: 1,
            total: 2
        })
    ));
}

#[tokio::test]
async fn test_rest_facet_counts() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({
            "size": 0,
            "aggs": { "facet": { "terms": { "field": "user", "size": 2 } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": { "total": { "value": 40 }, "hits": [] },
            "aggregations": { "facet": { "buckets": [
                { "key": "alice", "doc_count": 25 },
                { "key": "bob", "doc_count": 15 }
            ] } }
        })))
        .mount(&server)
        .await;

    let store = open_store(&format!("{}/users", server.uri()), &Client::new())
        .await
        .unwrap();
    let facets = store
        .facet_counts(&Query::match_all().exists("update_dt"), "user", 2)
        .await
        .unwrap();

    assert_eq!(
        facets,
        vec![("alice".to_string(), 25), ("bob".to_string(), 15)]
    );
}

#[tokio::test]
async fn test_delete_all_on_rest_target() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/_delete_by_query"))
        .and(query_param("conflicts", "proceed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deleted": 12 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/_refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ferry = Ferry::new(Config::default()).unwrap();
    ferry
        .run(
            Operation::DeleteAll,
            &format!("{}/users", server.uri()),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failing_search_page_is_skipped() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({ "from": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["u1", "u2"], 6)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({ "from": 2 })))
        .respond_with(ResponseTemplate::new(500).set_body_string("shard failure"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({ "from": 4 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["u5", "u6"], 6)))
        .mount(&server)
        .await;

    let target = TempStore::new("target.db");
    let config = Config {
        transfer: TransferConfig {
            page_size: 2,
            commit_every: 100_000,
        },
        ..Default::default()
    };
    let ferry = Ferry::new(config).unwrap();

    let summary = ferry
        .fill_from(
            &target.url(),
            Some(&format!("{}/users", server.uri())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let OperationSummary::Transferred { counters, .. } = summary else {
        panic!("unexpected summary: {:?}", summary);
    };
    assert_eq!(counters.pages_failed, 1);
    assert_eq!(counters.records_copied, 4);
    assert!(target.open().get("u3").unwrap().is_none());
}

#[tokio::test]
async fn test_missing_source_for_copy_users() {
    let target = TempStore::new("target.db");
    let ferry = Ferry::new(Config::default()).unwrap();

    let result = ferry
        .run(Operation::CopyUsers, &target.url(), None, CancellationToken::new())
        .await;

    assert!(matches!(result, Err(FerryError::MissingArgument(_))));
}

#[tokio::test]
async fn test_copy_users_skips_failing_page() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({ "from": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["u1", "u2"], 6)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({ "from": 2 })))
        .respond_with(ResponseTemplate::new(500).set_body_string("shard failure"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/_search"))
        .and(body_partial_json(json!({ "from": 4 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["u5", "u6"], 6)))
        .mount(&server)
        .await;

    let target = TempStore::new("target.db");
    let config = Config {
        transfer: TransferConfig {
            page_size: 2,
            commit_every: 100_000,
        },
        ..Default::default()
    };
    let ferry = Ferry::new(config).unwrap();

    let summary = ferry
        .copy_users(
            &target.url(),
            Some(&format!("{}/users", server.uri())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        summary,
        OperationSummary::UsersCopied {
            copied: 4,
            interrupted: false
        }
    );
    assert_eq!(visible_count(&target.path).await, 4);
    let store = target.open();
    for id in ["u1", "u2", "u5", "u6"] {
        assert!(store.get(id).unwrap().is_some(), "{} was not copied", id);
    }
    assert!(store.get("u3").unwrap().is_none());
}
