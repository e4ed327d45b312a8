//! Order persistence.
//!
//! Every read and write goes through an [`OrderTx`] opened by
//! [`OrderStore::begin`]. Dropping a transaction without committing it
//! discards its writes.

pub mod memory;
pub mod sqlite;
pub mod tx;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::order::{ListQuery, NewOrder, Order, OrderId, OrderPage, ShippedStatus};

/// Most rows a single [`OrderTx::create_bulk`] call accepts, on every
/// provider.
pub const MAX_BULK_ROWS: usize = 5_000;

pub(crate) fn check_bulk_size(rows: usize) -> Result<(), AppError> {
    if rows > MAX_BULK_ROWS {
        return Err(AppError::Validation(format!(
            "bulk insert of {rows} rows exceeds the limit of {MAX_BULK_ROWS}"
        )));
    }
    Ok(())
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn OrderTx>, AppError>;

    /// Short provider name reported by the health endpoint.
    fn backend(&self) -> &'static str;
}

#[async_trait]
pub trait OrderTx: Send {
    /// Every order currently awaiting shipment, by ascending id. The full
    /// backlog is returned; callers rely on seeing all of it.
    async fn fetch_pending(&mut self) -> Result<Vec<Order>, AppError>;

    /// Sets `status` on every listed order in a single statement and returns
    /// the number of rows changed. An empty id list is a no-op. Moving to
    /// `delivered` also stamps `arrived_at`.
    async fn bulk_transition(
        &mut self,
        order_ids: &[OrderId],
        status: &ShippedStatus,
    ) -> Result<u64, AppError>;

    async fn create_one(&mut self, order: &NewOrder) -> Result<OrderId, AppError>;

    /// Inserts all rows with one multi-row statement and returns their ids
    /// in input order. More than [`MAX_BULK_ROWS`] rows is a validation
    /// error.
    ///
    /// The ids are rebuilt from the provider's generated key and the row
    /// count, so the provider must hand out consecutive keys within a
    /// single insert statement.
    async fn create_bulk(&mut self, orders: &[NewOrder]) -> Result<Vec<OrderId>, AppError>;

    async fn get(&mut self, order_id: OrderId) -> Result<Option<Order>, AppError>;

    async fn list_for_user(&mut self, query: &ListQuery) -> Result<OrderPage, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}
