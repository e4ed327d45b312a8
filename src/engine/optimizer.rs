use crate::engine::context::{CheckPolicy, Checkpoint};
use crate::error::AppError;
use crate::models::order::Order;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub orders: Vec<Order>,
    pub total_weight: i64,
    pub total_value: i64,
}

/// Upper bound on `orders * (capacity + 1)` choice flags kept for one
/// planning call.
pub const MAX_TABLE_CELLS: usize = 1 << 28;

/// Weight cells swept between two checkpoint polls, whatever the order
/// interval says.
const SWEEP_BUDGET: usize = 1 << 22;

/// Picks the subset of `orders` with the highest total value whose total
/// weight fits in `capacity` (0/1 knapsack).
///
/// `best[w]` holds the best value reachable with weight at most `w` over the
/// orders seen so far. Each order sweeps `w` downwards so it is counted at
/// most once. `chosen` is a flat `n * (capacity + 1)` table recording
/// whether order `i` strictly improved `best[w]`; on ties the earlier order
/// keeps the slot. The checkpoint is polled every `policy` orders, and
/// earlier once `SWEEP_BUDGET` cells have been swept since the last poll,
/// never inside the weight sweep.
///
/// A capacity above the combined weight of all orders is clamped to that
/// weight. Tables larger than [`MAX_TABLE_CELLS`] are refused.
///
/// Selected orders keep their input relative order. A capacity of zero or
/// less always yields an empty selection.
pub fn select<C>(
    orders: &[Order],
    capacity: i64,
    checkpoint: &C,
    policy: CheckPolicy,
) -> Result<Selection, AppError>
where
    C: Checkpoint + ?Sized,
{
    if orders.is_empty() || capacity <= 0 {
        return Ok(Selection::default());
    }

    let weights = orders
        .iter()
        .map(order_weight)
        .collect::<Result<Vec<usize>, AppError>>()?;
    let total_weight = weights
        .iter()
        .fold(0usize, |sum, &weight| sum.saturating_add(weight));
    let cap = usize::try_from(capacity)
        .unwrap_or(usize::MAX)
        .min(total_weight);

    let width = cap
        .checked_add(1)
        .and_then(|width| width.checked_mul(orders.len()).map(|_| width))
        .filter(|width| width * orders.len() <= MAX_TABLE_CELLS)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "capacity {capacity} over {} orders exceeds the planning table limit",
                orders.len()
            ))
        })?;

    let mut best = zeroed(width, 0i64)?;
    let mut chosen = zeroed(orders.len() * width, false)?;

    let mut swept = 0usize;
    for (i, order) in orders.iter().enumerate() {
        if policy.due(i) || swept >= SWEEP_BUDGET {
            checkpoint.check()?;
            swept = 0;
        }

        let weight = weights[i];
        if weight > cap {
            continue;
        }
        swept += cap - weight + 1;

        let row = &mut chosen[i * width..(i + 1) * width];
        for w in (weight..=cap).rev() {
            let candidate = best[w - weight].saturating_add(order.value);
            if candidate > best[w] {
                best[w] = candidate;
                row[w] = true;
            }
        }
    }

    let mut remaining = cap;
    let mut picked = Vec::new();
    for i in (0..orders.len()).rev() {
        if chosen[i * width + remaining] {
            picked.push(i);
            remaining -= weights[i];
        }
    }
    picked.reverse();

    let selected: Vec<Order> = picked.into_iter().map(|i| orders[i].clone()).collect();
    let total_weight = selected.iter().map(|order| order.weight).sum();
    let total_value = selected.iter().map(|order| order.value).sum();
    debug_assert_eq!(total_value, best[cap]);

    Ok(Selection {
        orders: selected,
        total_weight,
        total_value,
    })
}

fn zeroed<T: Clone>(len: usize, value: T) -> Result<Vec<T>, AppError> {
    let mut table = Vec::new();
    table.try_reserve_exact(len).map_err(|err| {
        AppError::Validation(format!("planning table of {len} cells: {err}"))
    })?;
    table.resize(len, value);
    Ok(table)
}

fn order_weight(order: &Order) -> Result<usize, AppError> {
    if order.value < 0 {
        return Err(AppError::Validation(format!(
            "order {} has negative value {}",
            order.order_id, order.value
        )));
    }
    usize::try_from(order.weight).map_err(|_| {
        AppError::Validation(format!(
            "order {} has invalid weight {}",
            order.order_id, order.weight
        ))
    })
}
