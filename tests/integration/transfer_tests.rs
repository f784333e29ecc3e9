use crate::common::{users, visible_count, TempStore};
use doc_ferry::config::{Config, CopyUsersConfig, TransferConfig};
use doc_ferry::pipeline::{Ferry, Operation, OperationSummary};
use doc_ferry::FerryError;
use tokio_util::sync::CancellationToken;

fn config_with_page_size(page_size: u32, commit_every: u64) -> Config {
    Config {
        transfer: TransferConfig {
            page_size,
            commit_every,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_fill_from_copies_every_record() {
    let source = TempStore::new("source.db");
    let target = TempStore::new("target.db");
    source.seed(&users(50)).await;

    let ferry = Ferry::new(config_with_page_size(7, 100_000)).unwrap();
    let summary = ferry
        .run(
            Operation::FillFrom,
            &target.url(),
            Some(&source.url()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    match summary {
        OperationSummary::Transferred {
            counters,
            interrupted,
        } => {
            assert!(!interrupted);
            assert_eq!(counters.records_copied, 50);
            assert_eq!(counters.planned_pages, 8);
            assert_eq!(counters.pages_processed, 8);
            assert_eq!(counters.commits, 0);
        }
        other => panic!("unexpected summary: {:?}", other),
    }

    // Final flush made the staged records visible
    assert_eq!(visible_count(&target.path).await, 50);
    let copied = target.open().get("user-049").unwrap().unwrap();
    assert_eq!(copied.field("followers"), Some(&serde_json::json!(49)));
}

#[tokio::test]
async fn test_fill_from_commits_periodically() {
    let source = TempStore::new("source.db");
    let target = TempStore::new("target.db");
    source.seed(&users(30)).await;

    let ferry = Ferry::new(config_with_page_size(5, 10)).unwrap();
    let summary = ferry
        .fill_from(&target.url(), Some(&source.url()), &CancellationToken::new())
        .await
        .unwrap();

    let OperationSummary::Transferred { counters, .. } = summary else {
        panic!("unexpected summary: {:?}", summary);
    };
    assert_eq!(counters.commits, 3);
    assert_eq!(visible_count(&target.path).await, 30);
}

#[tokio::test]
async fn test_fill_from_into_populated_target_overwrites_by_id() {
    let source = TempStore::new("source.db");
    let target = TempStore::new("target.db");
    source.seed(&users(10)).await;
    target
        .seed(&[doc_ferry::Record::new("user-003").with_field("followers", 999)])
        .await;

    let ferry = Ferry::new(Config::default()).unwrap();
    ferry
        .fill_from(&target.url(), Some(&source.url()), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(visible_count(&target.path).await, 10);
    let record = target.open().get("user-003").unwrap().unwrap();
    assert_eq!(record.field("followers"), Some(&serde_json::json!(3)));
}

#[tokio::test]
async fn test_fill_from_without_source_fails() {
    let target = TempStore::new("target.db");
    let ferry = Ferry::new(Config::default()).unwrap();

    let result = ferry
        .run(Operation::FillFrom, &target.url(), None, CancellationToken::new())
        .await;

    assert!(matches!(result, Err(FerryError::MissingArgument(_))));
}

#[tokio::test]
async fn test_copy_users_reads_source_from_config() {
    let source = TempStore::new("users.db");
    let target = TempStore::new("target.db");
    source.seed(&users(12)).await;

    let config = Config {
        transfer: TransferConfig {
            page_size: 5,
            commit_every: 100_000,
        },
        copy_users: CopyUsersConfig {
            source_url: Some(source.url()),
        },
        ..Default::default()
    };
    let ferry = Ferry::new(config).unwrap();

    let summary = ferry
        .run(Operation::CopyUsers, &target.url(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        OperationSummary::UsersCopied {
            copied: 12,
            interrupted: false
        }
    );
    assert_eq!(visible_count(&target.path).await, 12);
}

#[tokio::test]
async fn test_delete_all_empties_target() {
    let target = TempStore::new("target.db");
    target.seed(&users(20)).await;
    assert_eq!(visible_count(&target.path).await, 20);

    let ferry = Ferry::new(Config::default()).unwrap();
    ferry
        .run(Operation::DeleteAll, &target.url(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(visible_count(&target.path).await, 0);
}
