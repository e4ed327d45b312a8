use futures::future::BoxFuture;
use tracing::warn;

use crate::engine::context::RequestContext;
use crate::error::AppError;
use crate::store::{OrderStore, OrderTx};

pub type TxFuture<'t, T> = BoxFuture<'t, Result<T, AppError>>;

/// Runs `work` inside one store transaction bounded by the context deadline.
///
/// `Ok` commits, `Err` rolls back and hands the error back unchanged. If the
/// deadline passes or the context is cancelled first, the in-flight
/// transaction is dropped, which discards its writes.
pub async fn run_transactional<T, F>(
    store: &dyn OrderStore,
    ctx: &RequestContext,
    work: F,
) -> Result<T, AppError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn OrderTx) -> TxFuture<'t, T> + Send,
{
    let attempt = async {
        let mut tx = store.begin().await?;
        match work(tx.as_mut()).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    };

    tokio::select! {
        result = tokio::time::timeout_at(ctx.deadline(), attempt) => match result {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!("transaction deadline exceeded; rolled back");
                Err(AppError::Timeout)
            }
        },
        _ = ctx.token().cancelled() => {
            warn!("transaction cancelled; rolled back");
            Err(AppError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::run_transactional;
    use crate::engine::context::RequestContext;
    use crate::error::AppError;
    use crate::models::order::{NewOrder, ShippedStatus};
    use crate::store::memory::MemoryStore;
    use crate::store::OrderStore;

    fn new_order() -> NewOrder {
        NewOrder {
            user_id: 1,
            product_id: 1,
            weight: 1,
            value: 1,
        }
    }

    async fn pending(store: &MemoryStore) -> usize {
        let mut tx = store.begin().await.unwrap();
        tx.fetch_pending().await.unwrap().len()
    }

    #[tokio::test]
    async fn ok_commits() {
        let store = MemoryStore::new();
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));

        let ids = run_transactional(&store, &ctx, |tx| {
            Box::pin(async move { tx.create_bulk(&[new_order(), new_order()]).await })
        })
        .await
        .unwrap();

        assert_eq!(ids, vec![1, 2]);
        assert_eq!(pending(&store).await, 2);
    }

    #[tokio::test]
    async fn err_rolls_back_every_write() {
        let store = MemoryStore::new();
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));

        let result: Result<(), AppError> = run_transactional(&store, &ctx, |tx| {
            Box::pin(async move {
                tx.create_bulk(&[new_order(), new_order()]).await?;
                tx.bulk_transition(&[1], &ShippedStatus::Delivering).await?;
                Err(AppError::DataAccess("boom".to_string()))
            })
        })
        .await;

        assert!(matches!(result, Err(AppError::DataAccess(_))));
        assert_eq!(pending(&store).await, 0);
    }

    #[tokio::test]
    async fn deadline_aborts_and_discards() {
        let store = MemoryStore::new();
        let ctx = RequestContext::with_timeout(Duration::from_millis(20));

        let result: Result<(), AppError> = run_transactional(&store, &ctx, |tx| {
            Box::pin(async move {
                tx.create_one(&new_order()).await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await;

        assert!(matches!(result, Err(AppError::Timeout)));
        assert_eq!(pending(&store).await, 0);
    }

    #[tokio::test]
    async fn cancellation_aborts_and_discards() {
        let store = MemoryStore::new();
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));
        let token = ctx.token().clone();

        let result: Result<(), AppError> = run_transactional(&store, &ctx, move |tx| {
            Box::pin(async move {
                tx.create_one(&new_order()).await?;
                token.cancel();
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(pending(&store).await, 0);
    }
}
