use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::AppError;
use crate::models::order::{
    ListQuery, NewOrder, Order, OrderId, OrderPage, ShippedStatus, SortField,
};
use crate::store::{check_bulk_size, OrderStore, OrderTx};

#[derive(Debug, Default)]
struct Tables {
    orders: BTreeMap<OrderId, Order>,
    last_id: OrderId,
}

/// Process-local store. A transaction holds the table lock until it ends,
/// so transactions are fully serialized and ids within one bulk insert are
/// always consecutive.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn OrderTx>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(Box::new(MemoryTx {
            tables: guard,
            undo: Vec::new(),
        }))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug)]
enum Undo {
    Restore(Order),
    Remove(OrderId),
    LastId(OrderId),
}

pub struct MemoryTx {
    tables: OwnedMutexGuard<Tables>,
    undo: Vec<Undo>,
}

impl MemoryTx {
    fn revert(&mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Restore(order) => {
                    self.tables.orders.insert(order.order_id, order);
                }
                Undo::Remove(order_id) => {
                    self.tables.orders.remove(&order_id);
                }
                Undo::LastId(last_id) => self.tables.last_id = last_id,
            }
        }
    }

    fn insert(&mut self, order: &NewOrder) -> OrderId {
        let order_id = self.tables.last_id + 1;
        self.tables.last_id = order_id;
        self.tables.orders.insert(
            order_id,
            Order {
                order_id,
                user_id: order.user_id,
                product_id: order.product_id,
                weight: order.weight,
                value: order.value,
                shipped_status: ShippedStatus::Shipping,
                created_at: Utc::now(),
                arrived_at: None,
            },
        );
        self.undo.push(Undo::Remove(order_id));
        order_id
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.revert();
    }
}

#[async_trait]
impl OrderTx for MemoryTx {
    async fn fetch_pending(&mut self) -> Result<Vec<Order>, AppError> {
        Ok(self
            .tables
            .orders
            .values()
            .filter(|order| order.shipped_status == ShippedStatus::Shipping)
            .cloned()
            .collect())
    }

    async fn bulk_transition(
        &mut self,
        order_ids: &[OrderId],
        status: &ShippedStatus,
    ) -> Result<u64, AppError> {
        let unique: BTreeSet<OrderId> = order_ids.iter().copied().collect();
        let now = Utc::now();
        let mut changed = 0;

        for order_id in unique {
            let Some(order) = self.tables.orders.get_mut(&order_id) else {
                continue;
            };
            let previous = order.clone();
            order.shipped_status = status.clone();
            if *status == ShippedStatus::Delivered {
                order.arrived_at = Some(now);
            }
            self.undo.push(Undo::Restore(previous));
            changed += 1;
        }

        Ok(changed)
    }

    async fn create_one(&mut self, order: &NewOrder) -> Result<OrderId, AppError> {
        self.undo.push(Undo::LastId(self.tables.last_id));
        Ok(self.insert(order))
    }

    async fn create_bulk(&mut self, orders: &[NewOrder]) -> Result<Vec<OrderId>, AppError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        check_bulk_size(orders.len())?;
        self.undo.push(Undo::LastId(self.tables.last_id));
        Ok(orders.iter().map(|order| self.insert(order)).collect())
    }

    async fn get(&mut self, order_id: OrderId) -> Result<Option<Order>, AppError> {
        Ok(self.tables.orders.get(&order_id).cloned())
    }

    async fn list_for_user(&mut self, query: &ListQuery) -> Result<OrderPage, AppError> {
        let mut matching: Vec<&Order> = self
            .tables
            .orders
            .values()
            .filter(|order| order.user_id == query.user_id)
            .collect();

        matching.sort_by(|a, b| {
            let primary = compare_by(query.sort_field, a, b);
            let primary = if query.descending {
                primary.reverse()
            } else {
                primary
            };
            primary.then_with(|| a.order_id.cmp(&b.order_id))
        });

        let total = matching.len() as i64;
        let offset = usize::try_from(query.offset).unwrap_or(0);
        let page_size = usize::try_from(query.page_size).unwrap_or(0);
        let orders = matching
            .into_iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect();

        Ok(OrderPage { orders, total })
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mut tx = self;
        tx.undo.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        let mut tx = self;
        tx.revert();
        Ok(())
    }
}

// NULL arrival times sort first, matching SQL ascending order.
fn compare_by(field: SortField, a: &Order, b: &Order) -> Ordering {
    match field {
        SortField::OrderId => a.order_id.cmp(&b.order_id),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::ShippedStatus => a.shipped_status.as_str().cmp(b.shipped_status.as_str()),
        SortField::ArrivedAt => a.arrived_at.cmp(&b.arrived_at),
    }
}
