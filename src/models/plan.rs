use serde::{Deserialize, Serialize};

use crate::models::order::{Order, OrderId};

/// Orders assigned to one robot for one run. Built per planning call and
/// never persisted; only the status change of its orders is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub robot_id: String,
    pub total_weight: i64,
    pub total_value: i64,
    pub orders: Vec<Order>,
}

impl DeliveryPlan {
    pub fn order_ids(&self) -> Vec<OrderId> {
        self.orders.iter().map(|order| order.order_id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
