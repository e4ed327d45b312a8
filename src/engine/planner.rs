use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::catalog::ProductCatalog;
use crate::config::Config;
use crate::engine::context::{CheckPolicy, RequestContext};
use crate::engine::optimizer;
use crate::error::AppError;
use crate::models::order::{ListQuery, NewOrder, Order, OrderId, OrderItem, OrderPage, ShippedStatus};
use crate::models::plan::DeliveryPlan;
use crate::observability::metrics::Metrics;
use crate::store::tx::run_transactional;
use crate::store::{OrderStore, MAX_BULK_ROWS};

#[derive(Debug, Clone, Copy)]
pub struct PlannerOptions {
    /// Deadline applied to every planning, update and creation call.
    pub timeout: Duration,
    /// How often the optimizer checks the deadline and cancellation. Wide
    /// capacity sweeps also poll once enough weight cells have been swept,
    /// so a small backlog with a large capacity still stops shortly after
    /// the request expires or is dropped.
    pub policy: CheckPolicy,
}

impl PlannerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.request_timeout,
            policy: CheckPolicy::every(config.cancel_check_every),
        }
    }
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            policy: CheckPolicy::default(),
        }
    }
}

pub struct DeliveryPlanner {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    options: PlannerOptions,
    metrics: Metrics,
    plan_events_tx: broadcast::Sender<DeliveryPlan>,
}

impl DeliveryPlanner {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        options: PlannerOptions,
        metrics: Metrics,
        plan_events_tx: broadcast::Sender<DeliveryPlan>,
    ) -> Self {
        Self {
            store,
            catalog,
            options,
            metrics,
            plan_events_tx,
        }
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    fn context(&self) -> RequestContext {
        RequestContext::with_timeout(self.options.timeout)
    }

    pub async fn generate_plan(
        &self,
        robot_id: &str,
        capacity: i64,
    ) -> Result<DeliveryPlan, AppError> {
        self.generate_plan_with(&self.context(), robot_id, capacity)
            .await
    }

    /// Claims the most valuable backlog subset that fits `capacity` for
    /// `robot_id`. Either every selected order moves to `delivering` or, on
    /// any error, none does.
    pub async fn generate_plan_with(
        &self,
        ctx: &RequestContext,
        robot_id: &str,
        capacity: i64,
    ) -> Result<DeliveryPlan, AppError> {
        if robot_id.trim().is_empty() {
            return Err(AppError::Validation("robot_id cannot be empty".to_string()));
        }
        if capacity < 0 {
            return Err(AppError::Validation("capacity must be >= 0".to_string()));
        }

        let start = Instant::now();
        let result = self.plan_in_transaction(ctx, robot_id, capacity).await;
        let outcome = match &result {
            Ok(plan) if plan.is_empty() => "empty",
            Ok(_) => "success",
            Err(AppError::Timeout) => "timeout",
            Err(AppError::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        self.metrics
            .plan_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .plans_total
            .with_label_values(&[outcome])
            .inc();

        match result {
            Ok(plan) => {
                if !plan.is_empty() {
                    self.metrics
                        .orders_claimed_total
                        .inc_by(plan.orders.len() as u64);
                    let _ = self.plan_events_tx.send(plan.clone());
                }
                info!(
                    robot_id,
                    capacity,
                    orders = plan.orders.len(),
                    total_weight = plan.total_weight,
                    total_value = plan.total_value,
                    "delivery plan committed"
                );
                Ok(plan)
            }
            Err(err) => {
                error!(robot_id, capacity, error = %err, "delivery planning failed");
                Err(err)
            }
        }
    }

    async fn plan_in_transaction(
        &self,
        ctx: &RequestContext,
        robot_id: &str,
        capacity: i64,
    ) -> Result<DeliveryPlan, AppError> {
        // The sweep runs on the blocking pool and outlives this future if it
        // is dropped; cancelling the child token on drop stops it at the next
        // checkpoint.
        let ctx = RequestContext::new(ctx.deadline(), ctx.token().child_token());
        let _sweep_guard = ctx.token().clone().drop_guard();

        let sweep_ctx = ctx.clone();
        let policy = self.options.policy;
        let backlog = self.metrics.backlog_size.clone();
        let robot_id = robot_id.to_string();

        run_transactional(self.store.as_ref(), &ctx, move |tx| {
            Box::pin(async move {
                let pending = tx.fetch_pending().await?;
                backlog.set(pending.len() as i64);

                let selection = tokio::task::spawn_blocking(move || {
                    optimizer::select(&pending, capacity, &sweep_ctx, policy)
                })
                .await
                .map_err(|err| AppError::Internal(format!("optimizer task failed: {err}")))??;

                let plan = DeliveryPlan {
                    robot_id,
                    total_weight: selection.total_weight,
                    total_value: selection.total_value,
                    orders: selection.orders,
                };

                if !plan.is_empty() {
                    let order_ids = plan.order_ids();
                    let claimed = tx
                        .bulk_transition(&order_ids, &ShippedStatus::Delivering)
                        .await?;
                    if claimed != order_ids.len() as u64 {
                        return Err(AppError::DataAccess(format!(
                            "claimed {claimed} of {} planned orders",
                            order_ids.len()
                        )));
                    }
                }

                Ok(plan)
            })
        })
        .await
    }

    /// Overwrites one order's status. Any transition is accepted, including
    /// moves back to `shipping`.
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: &str,
    ) -> Result<(), AppError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(AppError::Validation("status cannot be empty".to_string()));
        }
        let status = ShippedStatus::from(status);
        let new_status = status.clone();

        let result = run_transactional(self.store.as_ref(), &self.context(), move |tx| {
            Box::pin(async move {
                let changed = tx.bulk_transition(&[order_id], &new_status).await?;
                if changed == 0 {
                    return Err(AppError::NotFound(format!("order {order_id} not found")));
                }
                Ok(())
            })
        })
        .await;

        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics
            .status_updates_total
            .with_label_values(&[outcome])
            .inc();

        match &result {
            Ok(()) => info!(order_id, status = %status, "order status updated"),
            Err(err) => warn!(order_id, status = %status, error = %err, "order status update failed"),
        }
        result
    }

    /// Places `quantity` orders per item for `user_id` in one bulk insert and
    /// returns the generated ids in item order.
    pub async fn create_orders(
        &self,
        user_id: i64,
        items: &[OrderItem],
    ) -> Result<Vec<OrderId>, AppError> {
        let mut total = 0usize;
        for item in items {
            let quantity = usize::try_from(item.quantity).map_err(|_| {
                AppError::Validation(format!(
                    "quantity for product {} must be >= 0",
                    item.product_id
                ))
            })?;
            total = total
                .checked_add(quantity)
                .filter(|&total| total <= MAX_BULK_ROWS)
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "order request exceeds the limit of {MAX_BULK_ROWS} orders"
                    ))
                })?;
        }

        let mut rows = Vec::with_capacity(total);
        for item in items {
            if item.quantity == 0 {
                continue;
            }

            let product = self.catalog.get(item.product_id).await?.ok_or_else(|| {
                AppError::Validation(format!("unknown product {}", item.product_id))
            })?;
            rows.extend((0..item.quantity).map(|_| NewOrder {
                user_id,
                product_id: product.product_id,
                weight: product.weight,
                value: product.value,
            }));
        }

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids = run_transactional(self.store.as_ref(), &self.context(), move |tx| {
            Box::pin(async move { tx.create_bulk(&rows).await })
        })
        .await?;

        info!(user_id, orders = order_ids.len(), "orders created");
        Ok(order_ids)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, AppError> {
        run_transactional(self.store.as_ref(), &self.context(), move |tx| {
            Box::pin(async move { tx.get(order_id).await })
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    }

    pub async fn list_orders(&self, query: ListQuery) -> Result<OrderPage, AppError> {
        let query = query.normalized();
        run_transactional(self.store.as_ref(), &self.context(), move |tx| {
            Box::pin(async move { tx.list_for_user(&query).await })
        })
        .await
    }
}
