use std::sync::Arc;

use robot_dispatch::catalog::MemoryCatalog;
use robot_dispatch::engine::planner::{DeliveryPlanner, PlannerOptions};
use robot_dispatch::error::AppError;
use robot_dispatch::models::order::{ListQuery, NewOrder, ShippedStatus, SortField};
use robot_dispatch::observability::metrics::Metrics;
use robot_dispatch::store::sqlite::SqliteStore;
use robot_dispatch::store::{OrderStore, MAX_BULK_ROWS};
use tokio::sync::broadcast;

async fn store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}

fn new_order(user_id: i64, weight: i64, value: i64) -> NewOrder {
    NewOrder {
        user_id,
        product_id: 1,
        weight,
        value,
    }
}

#[tokio::test]
async fn bulk_insert_returns_contiguous_ids() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();

    let first = tx.create_one(&new_order(1, 1, 1)).await.unwrap();
    let ids = tx
        .create_bulk(&[new_order(1, 2, 2), new_order(1, 3, 3), new_order(1, 4, 4)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(ids, vec![2, 3, 4]);

    let mut tx = store.begin().await.unwrap();
    let third = tx.get(3).await.unwrap().unwrap();
    assert_eq!(third.weight, 3);
    assert_eq!(third.shipped_status, ShippedStatus::Shipping);
}

#[tokio::test]
async fn oversized_bulk_insert_is_rejected() {
    let store = store().await;
    let rows = vec![new_order(1, 1, 1); MAX_BULK_ROWS + 1];

    let mut tx = store.begin().await.unwrap();
    let err = tx.create_bulk(&rows).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn rollback_discards_transitions_and_inserts() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    tx.create_bulk(&[new_order(1, 1, 1), new_order(1, 1, 1)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let changed = tx
        .bulk_transition(&[1, 2], &ShippedStatus::Delivering)
        .await
        .unwrap();
    assert_eq!(changed, 2);
    tx.create_one(&new_order(1, 1, 1)).await.unwrap();
    tx.rollback().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.fetch_pending().await.unwrap().len(), 2);
    assert!(tx.get(3).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_transition_touches_nothing() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.bulk_transition(&[], &ShippedStatus::Delivered)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn delivered_stamps_arrival_and_unknown_status_round_trips() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    let ids = tx
        .create_bulk(&[new_order(1, 1, 1), new_order(1, 1, 1)])
        .await
        .unwrap();
    tx.bulk_transition(&ids[..1], &ShippedStatus::Delivered)
        .await
        .unwrap();
    tx.bulk_transition(&ids[1..], &ShippedStatus::from("returned"))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let delivered = tx.get(ids[0]).await.unwrap().unwrap();
    assert!(delivered.arrived_at.is_some());

    let returned = tx.get(ids[1]).await.unwrap().unwrap();
    assert_eq!(returned.shipped_status.as_str(), "returned");
    assert!(returned.arrived_at.is_none());
}

#[tokio::test]
async fn list_sorts_with_order_id_tiebreak() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    tx.create_bulk(&[
        new_order(1, 1, 1),
        new_order(1, 1, 1),
        new_order(2, 1, 1),
        new_order(1, 1, 1),
    ])
    .await
    .unwrap();
    tx.bulk_transition(&[4], &ShippedStatus::Delivering)
        .await
        .unwrap();

    let page = tx
        .list_for_user(&ListQuery {
            sort_field: SortField::ShippedStatus,
            descending: true,
            ..ListQuery::new(1)
        })
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    let ids: Vec<i64> = page.orders.iter().map(|o| o.order_id).collect();
    assert_eq!(ids, vec![1, 2, 4]);
}

#[tokio::test]
async fn planner_claims_through_sqlite() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    let ids = tx
        .create_bulk(&[
            new_order(1, 2, 3),
            new_order(1, 3, 4),
            new_order(1, 4, 5),
            new_order(1, 5, 6),
        ])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let (plan_events_tx, _unused_rx) = broadcast::channel(4);
    let planner = Arc::new(DeliveryPlanner::new(
        Arc::new(store.clone()),
        Arc::new(MemoryCatalog::new()),
        PlannerOptions::default(),
        Metrics::new(),
        plan_events_tx,
    ));

    let first = planner.clone();
    let second = planner.clone();
    let (a, b) = tokio::join!(
        first.generate_plan("robot-a", 10),
        second.generate_plan("robot-b", 10)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut claimed = a.order_ids();
    claimed.extend(b.order_ids());
    let mut unique = claimed.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(claimed.len(), unique.len());
    assert_eq!(a.total_value.max(b.total_value), 13);

    let mut tx = store.begin().await.unwrap();
    for id in ids {
        let order = tx.get(id).await.unwrap().unwrap();
        let expected = if claimed.contains(&id) {
            ShippedStatus::Delivering
        } else {
            ShippedStatus::Shipping
        };
        assert_eq!(order.shipped_status, expected);
    }
}
