mod common;

use std::time::Duration;

use anyhow::Result;
use common::{balance, count_rows, open_account, test_store};
use microbank::domain::{TransferTxParams, net_amount};
use microbank::storage::{Page, StoreError};

#[tokio::test]
async fn test_transfer_moves_money_and_records_rows() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = open_account(&store, "alice", 100).await?;
    let b = open_account(&store, "bob", 50).await?;

    let result = store
        .transfer_tx(TransferTxParams::new(a.id, b.id, 30))
        .await?;

    assert_eq!(result.transfer.from_account_id, a.id);
    assert_eq!(result.transfer.to_account_id, b.id);
    assert_eq!(result.transfer.amount, 30);

    assert_eq!(result.from_entry.account_id, a.id);
    assert_eq!(result.from_entry.amount, -30);
    assert_eq!(result.to_entry.account_id, b.id);
    assert_eq!(result.to_entry.amount, 30);

    assert_eq!(result.from_account.id, a.id);
    assert_eq!(result.from_account.balance, 70);
    assert_eq!(result.to_account.id, b.id);
    assert_eq!(result.to_account.balance, 80);

    // Committed state matches the returned result
    assert_eq!(balance(&store, a.id).await?, 70);
    assert_eq!(balance(&store, b.id).await?, 80);
    assert_eq!(store.get_transfer(result.transfer.id).await?, result.transfer);
    assert_eq!(store.get_entry(result.from_entry.id).await?, result.from_entry);
    assert_eq!(store.get_entry(result.to_entry.id).await?, result.to_entry);

    assert_eq!(count_rows(&store, "transfers").await?, 1);
    assert_eq!(count_rows(&store, "entries").await?, 2);

    Ok(())
}

#[tokio::test]
async fn test_result_sides_follow_direction_not_lock_order() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let low = open_account(&store, "alice", 500).await?;
    let high = open_account(&store, "bob", 500).await?;
    assert!(low.id < high.id);

    // Source has the higher id, so its balance is updated second
    let result = store
        .transfer_tx(TransferTxParams::new(high.id, low.id, 120))
        .await?;

    assert_eq!(result.from_account.id, high.id);
    assert_eq!(result.from_account.balance, 380);
    assert_eq!(result.to_account.id, low.id);
    assert_eq!(result.to_account.balance, 620);
    assert_eq!(result.from_entry.amount, -120);
    assert_eq!(result.to_entry.amount, 120);

    Ok(())
}

#[tokio::test]
async fn test_entries_of_each_transfer_sum_to_zero() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = open_account(&store, "alice", 1_000).await?;
    let b = open_account(&store, "bob", 1_000).await?;

    for amount in [10, 25, 40] {
        store
            .transfer_tx(TransferTxParams::new(a.id, b.id, amount))
            .await?;
    }
    store.transfer_tx(TransferTxParams::new(b.id, a.id, 5)).await?;

    let page = Page::new(100, 0);
    let mut entries = store.list_entries(a.id, page).await?;
    entries.extend(store.list_entries(b.id, page).await?);

    assert_eq!(entries.len(), 8);
    assert_eq!(net_amount(&entries), 0);
    assert_eq!(count_rows(&store, "transfers").await?, 4);
    assert_eq!(balance(&store, a.id).await? + balance(&store, b.id).await?, 2_000);
    assert_eq!(balance(&store, a.id).await?, 930);

    Ok(())
}

#[tokio::test]
async fn test_missing_account_commits_nothing() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = open_account(&store, "alice", 100).await?;

    let err = store
        .transfer_tx(TransferTxParams::new(a.id, 9_999, 10))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err:?}");

    let err = store
        .transfer_tx(TransferTxParams::new(9_999, a.id, 10))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err:?}");

    assert_eq!(count_rows(&store, "transfers").await?, 0);
    assert_eq!(count_rows(&store, "entries").await?, 0);
    assert_eq!(balance(&store, a.id).await?, 100);

    Ok(())
}

#[tokio::test]
async fn test_failed_balance_update_rolls_back_earlier_writes() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = open_account(&store, "alice", 20).await?;
    let b = open_account(&store, "bob", 0).await?;

    // The engine does not check funds; the balance constraint rejects the
    // debit after the transfer and both entries were already inserted.
    let err = store
        .transfer_tx(TransferTxParams::new(a.id, b.id, 50))
        .await
        .unwrap_err();
    assert!(err.is_check_violation(), "unexpected error: {err:?}");
    assert!(!err.is_rollback_failure());

    assert_eq!(count_rows(&store, "transfers").await?, 0);
    assert_eq!(count_rows(&store, "entries").await?, 0);
    assert_eq!(balance(&store, a.id).await?, 20);
    assert_eq!(balance(&store, b.id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected_by_storage() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = open_account(&store, "alice", 100).await?;
    let b = open_account(&store, "bob", 100).await?;

    let err = store
        .transfer_tx(TransferTxParams::new(a.id, b.id, 0))
        .await
        .unwrap_err();
    assert!(err.is_check_violation(), "unexpected error: {err:?}");

    let err = store
        .transfer_tx(TransferTxParams::new(a.id, b.id, i64::MIN))
        .await
        .unwrap_err();
    assert!(err.is_check_violation(), "unexpected error: {err:?}");

    assert_eq!(count_rows(&store, "transfers").await?, 0);
    assert_eq!(balance(&store, a.id).await?, 100);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_same_direction() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = open_account(&store, "alice", 1_000).await?;
    let b = open_account(&store, "bob", 0).await?;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let params = TransferTxParams::new(a.id, b.id, 10);
        handles.push(tokio::spawn(async move { store.transfer_tx(params).await }));
    }

    let mut seen_balances = Vec::new();
    for handle in handles {
        let result = handle.await??;
        // Every result reflects a distinct serial position
        seen_balances.push(result.from_account.balance);
        assert_eq!(
            result.from_account.balance + result.to_account.balance,
            1_000
        );
    }
    seen_balances.sort_unstable();
    assert_eq!(seen_balances, (0..10).map(|i| 900 + i * 10).collect::<Vec<_>>());

    assert_eq!(balance(&store, a.id).await?, 900);
    assert_eq!(balance(&store, b.id).await?, 100);
    assert_eq!(count_rows(&store, "transfers").await?, 10);
    assert_eq!(count_rows(&store, "entries").await?, 20);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_both_directions_do_not_deadlock() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = open_account(&store, "alice", 1_000).await?;
    let b = open_account(&store, "bob", 1_000).await?;

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        let params = if i % 2 == 0 {
            TransferTxParams::new(a.id, b.id, 10)
        } else {
            TransferTxParams::new(b.id, a.id, 10)
        };
        handles.push(tokio::spawn(async move { store.transfer_tx(params).await }));
    }

    let all = async {
        for handle in handles {
            handle.await??;
        }
        Ok::<_, anyhow::Error>(())
    };
    tokio::time::timeout(Duration::from_secs(30), all).await??;

    assert_eq!(balance(&store, a.id).await?, 1_000);
    assert_eq!(balance(&store, b.id).await?, 1_000);
    assert_eq!(count_rows(&store, "transfers").await?, 20);
    assert_eq!(count_rows(&store, "entries").await?, 40);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_amounts_net_out() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = open_account(&store, "alice", 500).await?;
    let b = open_account(&store, "bob", 500).await?;

    let plan: Vec<(bool, i64)> = (1..=12).map(|i| (i % 3 != 0, i * 3)).collect();
    let expected_delta_a: i64 = plan
        .iter()
        .map(|&(a_to_b, amount)| if a_to_b { -amount } else { amount })
        .sum();

    let mut handles = Vec::new();
    for &(a_to_b, amount) in &plan {
        let store = store.clone();
        let params = if a_to_b {
            TransferTxParams::new(a.id, b.id, amount)
        } else {
            TransferTxParams::new(b.id, a.id, amount)
        };
        handles.push(tokio::spawn(async move { store.transfer_tx(params).await }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(balance(&store, a.id).await?, 500 + expected_delta_a);
    assert_eq!(balance(&store, b.id).await?, 500 - expected_delta_a);

    Ok(())
}

#[tokio::test]
async fn test_not_found_error_is_not_retryable() -> Result<()> {
    let (store, _temp) = test_store().await?;

    let err = store
        .transfer_tx(TransferTxParams::new(1, 2, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "account", .. }));
    assert!(!err.is_retryable());

    Ok(())
}
