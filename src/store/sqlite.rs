use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use tracing::info;

use crate::error::AppError;
use crate::models::order::{
    ListQuery, NewOrder, Order, OrderId, OrderPage, ShippedStatus, SortField,
};
use crate::store::{check_bulk_size, OrderStore, OrderTx};

/// SQLite caps bound parameters per statement; six are bound per row.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        order_id       INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id        INTEGER NOT NULL,
        product_id     INTEGER NOT NULL,
        weight         INTEGER NOT NULL CHECK (weight >= 0),
        value          INTEGER NOT NULL CHECK (value >= 0),
        shipped_status TEXT    NOT NULL,
        created_at     TEXT    NOT NULL,
        arrived_at     TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_shipped_status ON orders (shipped_status)",
    "CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders (user_id)",
];

const ORDER_COLUMNS: &str =
    "order_id, user_id, product_id, weight, value, shipped_status, created_at, arrived_at";

/// SQLite-backed store.
///
/// The pool keeps a single connection, so one transaction runs at a time
/// and a planning call's read and claim cannot interleave with another's.
/// `AUTOINCREMENT` keys are consecutive within one multi-row insert, which
/// `create_bulk` depends on.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url, "sqlite order store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn OrderTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTx { tx }))
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: i64,
    user_id: i64,
    product_id: i64,
    weight: i64,
    value: i64,
    shipped_status: String,
    created_at: DateTime<Utc>,
    arrived_at: Option<DateTime<Utc>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            order_id: row.order_id,
            user_id: row.user_id,
            product_id: row.product_id,
            weight: row.weight,
            value: row.value,
            shipped_status: ShippedStatus::from(row.shipped_status),
            created_at: row.created_at,
            arrived_at: row.arrived_at,
        }
    }
}

#[async_trait]
impl OrderTx for SqliteTx {
    async fn fetch_pending(&mut self) -> Result<Vec<Order>, AppError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE shipped_status = ? ORDER BY order_id"
        ))
        .bind(ShippedStatus::SHIPPING)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn bulk_transition(
        &mut self,
        order_ids: &[OrderId],
        status: &ShippedStatus,
    ) -> Result<u64, AppError> {
        if order_ids.is_empty() {
            return Ok(0);
        }

        // The id list travels as one JSON parameter so the statement stays
        // within SQLite's bind limit regardless of plan size.
        let ids = serde_json::to_string(order_ids)
            .map_err(|err| AppError::Internal(format!("failed to encode order ids: {err}")))?;
        let arrived_at = (*status == ShippedStatus::Delivered).then(Utc::now);

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET shipped_status = ?,
                arrived_at = COALESCE(?, arrived_at)
            WHERE order_id IN (SELECT value FROM json_each(?))
            "#,
        )
        .bind(status.as_str())
        .bind(arrived_at)
        .bind(ids)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn create_one(&mut self, order: &NewOrder) -> Result<OrderId, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (user_id, product_id, weight, value, shipped_status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.user_id)
        .bind(order.product_id)
        .bind(order.weight)
        .bind(order.value)
        .bind(ShippedStatus::SHIPPING)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn create_bulk(&mut self, orders: &[NewOrder]) -> Result<Vec<OrderId>, AppError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        check_bulk_size(orders.len())?;

        let now = Utc::now();
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO orders (user_id, product_id, weight, value, shipped_status, created_at) ",
        );
        builder.push_values(orders, |mut row, order| {
            row.push_bind(order.user_id)
                .push_bind(order.product_id)
                .push_bind(order.weight)
                .push_bind(order.value)
                .push_bind(ShippedStatus::SHIPPING)
                .push_bind(now);
        });

        let result = builder.build().execute(&mut *self.tx).await?;

        // SQLite reports the key of the last row; the first follows from
        // the row count.
        let inserted = result.rows_affected() as i64;
        if inserted != orders.len() as i64 {
            return Err(AppError::DataAccess(format!(
                "bulk insert wrote {inserted} of {} rows",
                orders.len()
            )));
        }
        let first_id = result.last_insert_rowid() - inserted + 1;

        Ok((first_id..first_id + inserted).collect())
    }

    async fn get(&mut self, order_id: OrderId) -> Result<Option<Order>, AppError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?"
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn list_for_user(&mut self, query: &ListQuery) -> Result<OrderPage, AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?")
            .bind(query.user_id)
            .fetch_one(&mut *self.tx)
            .await?;

        let direction = if query.descending { "DESC" } else { "ASC" };
        let order_by = match query.sort_field {
            SortField::OrderId => format!("order_id {direction}"),
            field => format!("{} {direction}, order_id ASC", field.column()),
        };

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY {order_by} LIMIT ? OFFSET ?"
        ))
        .bind(query.user_id)
        .bind(query.page_size)
        .bind(query.offset)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(OrderPage {
            orders: rows.into_iter().map(Order::from).collect(),
            total,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
