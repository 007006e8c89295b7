use tracing::{debug, instrument};

use crate::domain::{TransferTxParams, TransferTxResult, lock_order};

use super::{Queries, Store, StoreError};

impl Store {
    /// Move `params.amount` from one account to another as a single atomic
    /// unit of work.
    ///
    /// Writes one transfer row, one entry per side and both balance updates.
    /// Either all of them become visible or none does. Nothing is retried
    /// here; retrying transient failures is up to the caller.
    #[instrument(
        skip(self),
        fields(
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount
        )
    )]
    pub async fn transfer_tx(
        &self,
        params: TransferTxParams,
    ) -> Result<TransferTxResult, StoreError> {
        let result = self
            .run_in_transaction(move |queries| Box::pin(apply_transfer(queries, params)))
            .await?;

        debug!(transfer_id = result.transfer.id, "transfer committed");
        Ok(result)
    }
}

/// The transfer steps, run against an open transaction.
///
/// Balance updates always lock the lower account id first, whichever side it
/// is on, so transfers A->B and B->A running together cannot deadlock.
pub async fn apply_transfer(
    queries: &mut Queries<'_>,
    params: TransferTxParams,
) -> Result<TransferTxResult, StoreError> {
    let transfer = queries
        .create_transfer(params.from_account_id, params.to_account_id, params.amount)
        .await?;

    let debit = params.debit();
    let credit = params.credit();
    let from_entry = queries.create_entry(debit.account_id, debit.delta).await?;
    let to_entry = queries.create_entry(credit.account_id, credit.delta).await?;

    let [first, second] = lock_order([debit, credit]);
    let first_account = queries
        .add_account_balance(first.account_id, first.delta)
        .await?;
    let second_account = queries
        .add_account_balance(second.account_id, second.delta)
        .await?;

    let (from_account, to_account) = if first == debit {
        (first_account, second_account)
    } else {
        (second_account, first_account)
    };

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}
