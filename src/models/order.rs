use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type OrderId = i64;

/// Lifecycle position of an order. Stores persist the raw string, so values
/// outside the known workflow survive a round trip as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShippedStatus {
    Shipping,
    Delivering,
    Delivered,
    Other(String),
}

impl ShippedStatus {
    pub const SHIPPING: &'static str = "shipping";
    pub const DELIVERING: &'static str = "delivering";
    pub const DELIVERED: &'static str = "delivered";

    pub fn as_str(&self) -> &str {
        match self {
            ShippedStatus::Shipping => Self::SHIPPING,
            ShippedStatus::Delivering => Self::DELIVERING,
            ShippedStatus::Delivered => Self::DELIVERED,
            ShippedStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for ShippedStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            Self::SHIPPING => ShippedStatus::Shipping,
            Self::DELIVERING => ShippedStatus::Delivering,
            Self::DELIVERED => ShippedStatus::Delivered,
            _ => ShippedStatus::Other(raw),
        }
    }
}

impl From<&str> for ShippedStatus {
    fn from(raw: &str) -> Self {
        ShippedStatus::from(raw.to_string())
    }
}

impl From<ShippedStatus> for String {
    fn from(status: ShippedStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ShippedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: i64,
    pub product_id: i64,
    pub weight: i64,
    pub value: i64,
    pub shipped_status: ShippedStatus,
    pub created_at: DateTime<Utc>,
    pub arrived_at: Option<DateTime<Utc>>,
}

/// Row to be inserted. Weight and value are copied from the catalog at
/// order time and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: i64,
    pub product_id: i64,
    pub weight: i64,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    OrderId,
    CreatedAt,
    ShippedStatus,
    ArrivedAt,
}

impl SortField {
    /// Unknown names fall back to `OrderId`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "created_at" => SortField::CreatedAt,
            "shipped_status" => SortField::ShippedStatus,
            "arrived_at" => SortField::ArrivedAt,
            _ => SortField::OrderId,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::OrderId => "order_id",
            SortField::CreatedAt => "created_at",
            SortField::ShippedStatus => "shipped_status",
            SortField::ArrivedAt => "arrived_at",
        }
    }
}

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Order history query for a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub user_id: i64,
    pub sort_field: SortField,
    pub descending: bool,
    pub page_size: i64,
    pub offset: i64,
}

impl ListQuery {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            sort_field: SortField::OrderId,
            descending: false,
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }

    /// Clamps paging inputs into range: non-positive page sizes take the
    /// default, oversized ones are capped, negative offsets become zero.
    pub fn normalized(mut self) -> Self {
        if self.page_size <= 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self.page_size = self.page_size.min(MAX_PAGE_SIZE);
        self.offset = self.offset.max(0);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
}
