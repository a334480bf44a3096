// =============================================================================
// ORDER LIFECYCLE MODULE
// =============================================================================
// The order status state machine: given an order's current state and a target
// status, computes which transition timestamps to stamp and how each product's
// stock moves. The planner is pure; `Database::transition_order_status` applies
// the resulting plan inside a single transaction with the order and product
// rows locked, so the previous-status check always runs against the row being
// overwritten and never against a stale pre-transaction read.
//
// Stock rules:
//   - entering DELIVERED from any other status: each item decrements its
//     product's stock by the item quantity, floored at zero
//   - DELIVERED -> CANCELLED: each item restores its quantity and the product
//     is forced back in stock
//   - every other transition leaves stock untouched

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Order, OrderStatus};

/// One order item joined with the current stock of its product, as read
/// under the transaction's row locks.
#[derive(Debug, Clone)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub stock_count: i32,
}

/// Stock write for a single product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpdate {
    pub product_id: Uuid,
    pub new_stock: i32,
    pub in_stock: bool,
}

/// Everything the transaction must write for one transition. Timestamp
/// fields are `Some` only when the column should be stamped now; `None`
/// leaves the stored value alone, which is how each timestamp ends up set
/// at most once.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub target: OrderStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub stock_updates: Vec<StockUpdate>,
}

impl TransitionPlan {
    pub fn touches_stock(&self) -> bool {
        !self.stock_updates.is_empty()
    }
}

/// Compute the transition plan for `order` moving to `target`.
///
/// `lines` must hold every item of the order with the product stock counts
/// read in the same transaction that will apply the plan. Fails with an
/// internal error if the stored status is not one of the six recognized
/// values (a corrupt row, not a caller mistake).
pub fn plan_transition(
    order: &Order,
    lines: &[StockLine],
    target: OrderStatus,
    now: DateTime<Utc>,
) -> AppResult<TransitionPlan> {
    let previous = OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Internal(format!(
            "order {} has unrecognized stored status '{}'",
            order.id, order.status
        ))
    })?;

    let mut plan = TransitionPlan {
        target,
        confirmed_at: None,
        shipped_at: None,
        delivered_at: None,
        cancelled_at: None,
        stock_updates: Vec::new(),
    };

    // First entry into a stamped status sets its timestamp; re-entry never
    // overwrites. PENDING and PROCESSING have no timestamp.
    match target {
        OrderStatus::Confirmed if order.confirmed_at.is_none() => plan.confirmed_at = Some(now),
        OrderStatus::Shipped if order.shipped_at.is_none() => plan.shipped_at = Some(now),
        OrderStatus::Delivered if order.delivered_at.is_none() => plan.delivered_at = Some(now),
        OrderStatus::Cancelled if order.cancelled_at.is_none() => plan.cancelled_at = Some(now),
        _ => {}
    }

    // Stock reconciliation is keyed on the previous status, so re-applying
    // DELIVERED to an already-delivered order is a stock no-op and only a
    // cancellation of a delivered order restores quantities.
    if target == OrderStatus::Delivered && previous != OrderStatus::Delivered {
        for line in lines {
            let new_stock = (line.stock_count - line.quantity).max(0);
            plan.stock_updates.push(StockUpdate {
                product_id: line.product_id,
                new_stock,
                in_stock: new_stock > 0,
            });
        }
    } else if target == OrderStatus::Cancelled && previous == OrderStatus::Delivered {
        for line in lines {
            plan.stock_updates.push(StockUpdate {
                product_id: line.product_id,
                new_stock: line.stock_count + line.quantity,
                in_stock: true,
            });
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment_status;

    fn order_in(status: OrderStatus) -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: status.as_str().to_string(),
            payment_status: payment_status::PENDING.to_string(),
            total_cents: 4_497,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(quantity: i32, stock_count: i32) -> StockLine {
        StockLine {
            product_id: Uuid::new_v4(),
            quantity,
            stock_count,
        }
    }

    #[test]
    fn delivery_decrements_stock_by_item_quantity() {
        let order = order_in(OrderStatus::Pending);
        let lines = vec![line(2, 5), line(1, 4)];

        let plan =
            plan_transition(&order, &lines, OrderStatus::Delivered, Utc::now()).unwrap();

        assert_eq!(plan.stock_updates.len(), 2);
        assert_eq!(plan.stock_updates[0].new_stock, 3);
        assert!(plan.stock_updates[0].in_stock);
        assert_eq!(plan.stock_updates[1].new_stock, 3);
        assert!(plan.stock_updates[1].in_stock);
    }

    #[test]
    fn delivery_floors_stock_at_zero() {
        let order = order_in(OrderStatus::Shipped);
        let lines = vec![line(10, 3)];

        let plan =
            plan_transition(&order, &lines, OrderStatus::Delivered, Utc::now()).unwrap();

        assert_eq!(plan.stock_updates[0].new_stock, 0);
        assert!(!plan.stock_updates[0].in_stock);
    }

    // Item A qty 2 on stock 5, item B qty 1 on stock 0 (forced in stock by
    // an admin edit): A lands on 3, B stays at the floor and goes out of stock.
    #[test]
    fn delivery_scenario_mixed_stock_levels() {
        let order = order_in(OrderStatus::Pending);
        let lines = vec![line(2, 5), line(1, 0)];

        let plan =
            plan_transition(&order, &lines, OrderStatus::Delivered, Utc::now()).unwrap();

        assert_eq!(plan.stock_updates[0].new_stock, 3);
        assert!(plan.stock_updates[0].in_stock);
        assert_eq!(plan.stock_updates[1].new_stock, 0);
        assert!(!plan.stock_updates[1].in_stock);
    }

    #[test]
    fn redelivering_a_delivered_order_does_not_double_decrement() {
        let mut order = order_in(OrderStatus::Delivered);
        order.delivered_at = Some(Utc::now());
        // Stock already reflects the first delivery.
        let lines = vec![line(2, 3)];

        let plan =
            plan_transition(&order, &lines, OrderStatus::Delivered, Utc::now()).unwrap();

        assert!(!plan.touches_stock());
        assert!(plan.delivered_at.is_none());
    }

    #[test]
    fn cancelling_a_delivered_order_restores_quantities() {
        let mut order = order_in(OrderStatus::Delivered);
        order.delivered_at = Some(Utc::now());
        // Post-delivery counts from the mixed scenario above.
        let lines = vec![line(2, 3), line(1, 0)];

        let plan =
            plan_transition(&order, &lines, OrderStatus::Cancelled, Utc::now()).unwrap();

        assert_eq!(plan.stock_updates[0].new_stock, 5);
        assert!(plan.stock_updates[0].in_stock);
        assert_eq!(plan.stock_updates[1].new_stock, 1);
        assert!(plan.stock_updates[1].in_stock);
        assert!(plan.cancelled_at.is_some());
    }

    #[test]
    fn cancelling_an_undelivered_order_leaves_stock_alone() {
        for previous in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            let order = order_in(previous);
            let lines = vec![line(2, 5)];

            let plan =
                plan_transition(&order, &lines, OrderStatus::Cancelled, Utc::now()).unwrap();

            assert!(!plan.touches_stock(), "stock moved cancelling from {previous}");
            assert!(plan.cancelled_at.is_some());
        }
    }

    #[test]
    fn non_delivery_transitions_never_touch_stock() {
        let pairs = [
            (OrderStatus::Pending, OrderStatus::Confirmed),
            (OrderStatus::Confirmed, OrderStatus::Processing),
            (OrderStatus::Processing, OrderStatus::Shipped),
            (OrderStatus::Shipped, OrderStatus::Pending),
            (OrderStatus::Delivered, OrderStatus::Processing),
        ];

        for (previous, target) in pairs {
            let order = order_in(previous);
            let lines = vec![line(3, 7)];

            let plan = plan_transition(&order, &lines, target, Utc::now()).unwrap();

            assert!(!plan.touches_stock(), "stock moved on {previous} -> {target}");
        }
    }

    #[test]
    fn stock_never_goes_negative_across_transition_sequences() {
        // Deliver, cancel, redeliver with a quantity larger than stock.
        let lines = vec![line(4, 2)];
        let order = order_in(OrderStatus::Confirmed);

        let delivered =
            plan_transition(&order, &lines, OrderStatus::Delivered, Utc::now()).unwrap();
        assert_eq!(delivered.stock_updates[0].new_stock, 0);

        let mut cancelled_from = order_in(OrderStatus::Delivered);
        cancelled_from.delivered_at = Some(Utc::now());
        let after_delivery = vec![StockLine {
            stock_count: delivered.stock_updates[0].new_stock,
            ..lines[0].clone()
        }];
        let restored = plan_transition(
            &cancelled_from,
            &after_delivery,
            OrderStatus::Cancelled,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(restored.stock_updates[0].new_stock, 4);
        assert!(restored.stock_updates[0].new_stock >= 0);
    }

    #[test]
    fn first_entry_stamps_the_matching_timestamp() {
        let now = Utc::now();
        let order = order_in(OrderStatus::Pending);

        let plan = plan_transition(&order, &[], OrderStatus::Confirmed, now).unwrap();
        assert_eq!(plan.confirmed_at, Some(now));
        assert!(plan.shipped_at.is_none());

        let plan = plan_transition(&order, &[], OrderStatus::Shipped, now).unwrap();
        assert_eq!(plan.shipped_at, Some(now));

        let plan = plan_transition(&order, &[], OrderStatus::Delivered, now).unwrap();
        assert_eq!(plan.delivered_at, Some(now));
    }

    #[test]
    fn timestamps_are_never_overwritten_on_reentry() {
        let first = Utc::now();
        let mut order = order_in(OrderStatus::Shipped);
        order.confirmed_at = Some(first);

        let plan = plan_transition(&order, &[], OrderStatus::Confirmed, Utc::now()).unwrap();

        assert!(plan.confirmed_at.is_none());
    }

    #[test]
    fn pending_and_processing_never_stamp_timestamps() {
        let order = order_in(OrderStatus::Confirmed);

        for target in [OrderStatus::Pending, OrderStatus::Processing] {
            let plan = plan_transition(&order, &[], target, Utc::now()).unwrap();
            assert!(plan.confirmed_at.is_none());
            assert!(plan.shipped_at.is_none());
            assert!(plan.delivered_at.is_none());
            assert!(plan.cancelled_at.is_none());
        }
    }

    #[test]
    fn corrupt_stored_status_is_an_internal_error() {
        let mut order = order_in(OrderStatus::Pending);
        order.status = "SHIPPEDX".to_string();

        let result = plan_transition(&order, &[], OrderStatus::Delivered, Utc::now());

        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
