//! Checkout and the order lifecycle.
//!
//! Checkout turns the session's cart into one [`Order`] plus one [`Payment`]
//! per shop that appears in the cart. Payments are simulated as settled
//! immediately. After checkout an order only moves forward:
//!
//! ```text
//! pending -> confirmed -> shipped -> delivered
//!    \
//!     -> cancelled
//! ```

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutRequest, OrderList, OrderWithPayments, UpdateOrderStatusRequest},
    error::{AppError, AppResult, Guard},
    middleware::auth::AuthUser,
    models::{
        CartLine, NotificationType, Order, OrderStatus, Payment, PaymentStatus,
        Priority, Role, RoleBucket, TransactionStatus,
    },
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        current_session,
        notification_service::{Event, notify},
        signed_in,
    },
    state::AppState,
    storefront::{Draft, Storefront},
};

pub const ESTIMATED_DELIVERY_DAYS: i64 = 3;

/// Decides what a cart line costs at checkout.
///
/// Both the order total and every shop's payment are computed through the
/// same policy, so payments always add up to the total.
pub trait PricingPolicy: Send + Sync {
    fn unit_price(&self, line: &CartLine) -> i64;
}

/// Charges the price captured when the line was added to the cart.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListPrice;

impl PricingPolicy for ListPrice {
    fn unit_price(&self, line: &CartLine) -> i64 {
        line.price
    }
}

fn total_too_large() -> AppError {
    AppError::validation("order total is too large")
}

fn line_total(policy: &dyn PricingPolicy, line: &CartLine) -> AppResult<i64> {
    policy
        .unit_price(line)
        .checked_mul(line.quantity)
        .ok_or_else(total_too_large)
}

/// Sum of the lines under `policy`, failing instead of wrapping.
pub fn priced_total(policy: &dyn PricingPolicy, lines: &[CartLine]) -> AppResult<i64> {
    lines.iter().try_fold(0i64, |total, line| {
        total
            .checked_add(line_total(policy, line)?)
            .ok_or_else(total_too_large)
    })
}

/// Groups lines by shop, keeping shops in the order they first appear.
pub fn group_by_shop(lines: &[CartLine]) -> Vec<(Uuid, Vec<CartLine>)> {
    let mut groups: Vec<(Uuid, Vec<CartLine>)> = Vec::new();
    for line in lines {
        match groups.iter_mut().find(|(shop_id, _)| *shop_id == line.shop_id) {
            Some((_, group)) => group.push(line.clone()),
            None => groups.push((line.shop_id, vec![line.clone()])),
        }
    }
    groups
}

fn build_transaction_id(payment_id: Uuid, now: DateTime<Utc>) -> String {
    let date = now.format("%Y%m%d");
    let suffix = payment_id.simple().to_string();
    format!("TXN-{}-{}", date, &suffix[..8])
}

/// Places the order for the draft's session and empties its cart.
pub fn place_order(
    draft: &mut Draft,
    policy: &dyn PricingPolicy,
    request: CheckoutRequest,
    now: DateTime<Utc>,
) -> AppResult<OrderWithPayments> {
    let session = signed_in(draft)?;
    if !session.role().is_customer() {
        return Err(AppError::GuardViolation(Guard::WrongRole));
    }
    if session.cart.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let user_id = session.user.user_id;
    let items = session.cart.clone();
    let total = priced_total(policy, &items)?;
    let groups = group_by_shop(&items);

    let order = Order {
        id: Uuid::new_v4(),
        user_id,
        shop_ids: groups.iter().map(|(shop_id, _)| *shop_id).collect(),
        items,
        total,
        date: now,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Paid,
        payment_method: request.payment_method,
        payment_date: now,
        confirmed_date: None,
        shipped_date: None,
        delivered_date: None,
        cancelled_date: None,
        cancellation_reason: None,
        estimated_delivery: now + Duration::days(ESTIMATED_DELIVERY_DAYS),
        shipping_address: request
            .shipping_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
        version: 1,
    };

    let payments = groups
        .into_iter()
        .map(|(shop_id, lines)| {
            let id = Uuid::new_v4();
            Ok(Payment {
                id,
                order_id: order.id,
                user_id,
                shop_id,
                amount: priced_total(policy, &lines)?,
                method: request.payment_method,
                status: TransactionStatus::Completed,
                transaction_id: build_transaction_id(id, now),
                payment_date: now,
                items: lines,
            })
        })
        .collect::<AppResult<Vec<Payment>>>()?;

    draft.orders_mut().push(order.clone());
    draft.payments_mut().extend(payments.iter().cloned());
    if let Some(session) = draft.session_mut() {
        session.cart.clear();
    }

    notify(
        draft,
        Event::new(
            NotificationType::Order,
            "New order",
            format!(
                "Order {} was placed with {} item(s)",
                order.id,
                order.items.len()
            ),
        )
        .with_priority(Priority::High),
        &[RoleBucket::Shop],
        now,
    );

    Ok(OrderWithPayments { order, payments })
}

/// Moves `order` to `next`, stamping the matching date once.
pub fn advance(
    order: &mut Order,
    next: OrderStatus,
    reason: Option<&str>,
    actor: &Role,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if !order.status.can_transition_to(next) {
        return Err(AppError::InvalidTransition {
            from: order.status,
            to: next,
        });
    }

    match next {
        OrderStatus::Confirmed => {
            order.confirmed_date.get_or_insert(now);
        }
        OrderStatus::Shipped => {
            order.shipped_date.get_or_insert(now);
        }
        OrderStatus::Delivered => {
            order.delivered_date.get_or_insert(now);
        }
        OrderStatus::Cancelled => {
            order.cancelled_date.get_or_insert(now);
            let reason = reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Cancelled by {}", actor.bucket()));
            order.cancellation_reason = Some(reason);
        }
        OrderStatus::Pending | OrderStatus::Refunded => {}
    }

    order.status = next;
    order.version += 1;
    Ok(())
}

/// Admins may move any order; shops only orders that contain their products.
pub fn ensure_can_manage(role: &Role, order: &Order) -> AppResult<()> {
    match role {
        Role::Admin => Ok(()),
        Role::Shop { shop_id } if order.involves_shop(*shop_id) => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

pub fn change_status(
    draft: &mut Draft,
    order_id: Uuid,
    request: &UpdateOrderStatusRequest,
    now: DateTime<Utc>,
) -> AppResult<Order> {
    let actor = signed_in(draft)?.role();
    let order = draft
        .storefront()
        .order(order_id)
        .ok_or(AppError::NotFound)?;
    ensure_can_manage(&actor, order)?;

    if let Some(expected) = request.expected_version {
        if expected != order.version {
            return Err(AppError::Conflict {
                expected,
                actual: order.version,
            });
        }
    }

    let order = draft
        .orders_mut()
        .iter_mut()
        .find(|o| o.id == order_id)
        .ok_or(AppError::NotFound)?;
    advance(order, request.status, request.reason.as_deref(), &actor, now)?;
    let order = order.clone();

    notify(
        draft,
        Event::new(
            NotificationType::Order,
            format!("Order {}", order.status),
            format!("Order {} is now {}", order.id, order.status),
        ),
        &[RoleBucket::Customer],
        now,
    );

    Ok(order)
}

/// Whether `role` may look at `order` and its payments.
pub fn can_view(role: &Role, user_id: Uuid, order: &Order) -> bool {
    match role {
        Role::Admin => true,
        Role::Shop { shop_id } => order.involves_shop(*shop_id),
        Role::Customer => order.user_id == user_id,
    }
}

/// Filters, sorts newest-first by default, and paginates.
pub(crate) fn select_orders<'a>(
    orders: impl Iterator<Item = &'a Order>,
    query: &OrderListQuery,
) -> (Vec<Order>, Meta) {
    let mut items: Vec<Order> = orders
        .filter(|o| query.status.is_none_or(|status| o.status == status))
        .cloned()
        .collect();
    match query.sort_order.unwrap_or_default() {
        SortOrder::Asc => items.sort_by_key(|o| o.date),
        SortOrder::Desc => items.sort_by_key(|o| std::cmp::Reverse(o.date)),
    }
    query.pagination().apply(items)
}

pub(crate) fn order_detail(storefront: &Storefront, order: &Order) -> OrderWithPayments {
    OrderWithPayments {
        order: order.clone(),
        payments: storefront.payments_for_order(order.id),
    }
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithPayments>> {
    let receipt = state
        .transact(Some(user.session_id), |draft| {
            place_order(draft, &ListPrice, payload, Utc::now())
        })
        .await?;

    tracing::info!(
        order_id = %receipt.order.id,
        user_id = %receipt.order.user_id,
        total = receipt.order.total,
        shops = receipt.payments.len(),
        "order placed"
    );

    Ok(ApiResponse::success(
        "Checkout success",
        receipt,
        Some(Meta::empty()),
    ))
}

/// The signed-in customer's own orders.
pub async fn current_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let session = current_session(state, user).await?;
    let user_id = session.user.user_id;
    let (items, meta) = state
        .read(|s| select_orders(s.orders.iter().filter(|o| o.user_id == user_id), &query))
        .await;
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithPayments>> {
    let session = current_session(state, user).await?;
    let role = session.role();
    let user_id = session.user.user_id;
    let detail = state
        .read(|s| {
            s.order(id)
                .filter(|order| can_view(&role, user_id, order))
                .map(|order| order_detail(s, order))
        })
        .await
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("OK", detail, Some(Meta::empty())))
}

pub async fn set_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = state
        .transact(Some(user.session_id), |draft| {
            change_status(draft, id, &payload, Utc::now())
        })
        .await?;

    tracing::info!(
        order_id = %order.id,
        status = %order.status,
        version = order.version,
        "order status changed"
    );

    Ok(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        models::{PaymentMethod, Product, ProductStatus, User},
        services::cart_service::add_line,
        session::Session,
    };

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: "u@example.com".into(),
            password_hash: String::new(),
            role,
            name: None,
            phone: None,
            address: None,
            created_at: Utc::now(),
        }
    }

    fn product(shop_id: Uuid, price: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            shop_id,
            name: "Item".into(),
            description: None,
            image: None,
            price,
            category: "misc".into(),
            status: ProductStatus::Approved,
            rejection_reason: None,
            submitted_at: Utc::now(),
            reviewed_at: None,
        }
    }

    /// Customer draft with P1 (S1, 100k) x2 and P2 (S2, 50k) x1 in the cart.
    fn two_shop_draft() -> (Draft, Uuid, Uuid) {
        let (s1, s2) = (Uuid::new_v4(), Uuid::new_v4());
        let customer = user(Role::Customer);
        let mut session = Session::start(&customer, Utc::now());
        add_line(Some(&mut session), &product(s1, 100_000), 2).unwrap();
        add_line(Some(&mut session), &product(s2, 50_000), 1).unwrap();

        let storefront = Storefront {
            users: vec![customer],
            ..Default::default()
        };
        (Draft::new(storefront, Some(session)), s1, s2)
    }

    fn pending_order(shop_id: Uuid) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            items: Vec::new(),
            total: 0,
            date: now,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Card,
            shop_ids: vec![shop_id],
            payment_date: now,
            confirmed_date: None,
            shipped_date: None,
            delivered_date: None,
            cancelled_date: None,
            cancellation_reason: None,
            estimated_delivery: now,
            shipping_address: None,
            version: 1,
        }
    }

    #[test]
    fn checkout_splits_payments_per_shop() {
        let (mut draft, s1, s2) = two_shop_draft();
        let now = Utc::now();
        let receipt = place_order(&mut draft, &ListPrice, CheckoutRequest::default(), now).unwrap();

        let order = &receipt.order;
        assert_eq!(order.total, 250_000);
        assert_eq!(order.shop_ids, vec![s1, s2]);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.estimated_delivery, now + Duration::days(3));
        assert!(order.confirmed_date.is_none());

        let amounts: Vec<_> = receipt.payments.iter().map(|p| (p.shop_id, p.amount)).collect();
        assert_eq!(amounts, vec![(s1, 200_000), (s2, 50_000)]);
        assert!(receipt.payments.iter().all(|p| p.order_id == order.id));
        assert!(receipt.payments.iter().all(|p| p.status == TransactionStatus::Completed));
        assert!(receipt.payments[0].transaction_id.starts_with("TXN-"));

        assert!(draft.session().unwrap().cart.is_empty());
        let storefront = draft.storefront();
        assert_eq!(storefront.orders.len(), 1);
        assert_eq!(storefront.payments.len(), 2);
        assert_eq!(storefront.notifications.shop.len(), 1);
        assert!(storefront.notifications.customer.is_empty());
    }

    #[test]
    fn order_shop_ids_match_payment_shops() {
        let (mut draft, _, _) = two_shop_draft();
        let receipt = place_order(&mut draft, &ListPrice, CheckoutRequest::default(), Utc::now()).unwrap();

        let from_order: BTreeSet<_> = receipt.order.shop_ids.iter().copied().collect();
        let from_payments: BTreeSet<_> = draft
            .storefront()
            .payments
            .iter()
            .filter(|p| p.order_id == receipt.order.id)
            .map(|p| p.shop_id)
            .collect();
        assert_eq!(from_order, from_payments);
    }

    #[test]
    fn checkout_preconditions() {
        let mut anonymous = Draft::new(Storefront::default(), None);
        assert!(matches!(
            place_order(&mut anonymous, &ListPrice, CheckoutRequest::default(), Utc::now()),
            Err(AppError::Unauthenticated)
        ));

        let customer = user(Role::Customer);
        let mut empty = Draft::new(Storefront::default(), Some(Session::start(&customer, Utc::now())));
        assert!(matches!(
            place_order(&mut empty, &ListPrice, CheckoutRequest::default(), Utc::now()),
            Err(AppError::EmptyCart)
        ));
        assert!(empty.storefront().orders.is_empty());

        let admin = user(Role::Admin);
        let mut staff = Draft::new(Storefront::default(), Some(Session::start(&admin, Utc::now())));
        assert!(matches!(
            place_order(&mut staff, &ListPrice, CheckoutRequest::default(), Utc::now()),
            Err(AppError::GuardViolation(Guard::WrongRole))
        ));
    }

    #[test]
    fn pricing_policy_drives_total_and_payments_alike() {
        struct HalfPrice;
        impl PricingPolicy for HalfPrice {
            fn unit_price(&self, line: &CartLine) -> i64 {
                line.price / 2
            }
        }

        let (mut draft, _, _) = two_shop_draft();
        let receipt = place_order(&mut draft, &HalfPrice, CheckoutRequest::default(), Utc::now()).unwrap();
        assert_eq!(receipt.order.total, 125_000);
        let paid: i64 = receipt.payments.iter().map(|p| p.amount).sum();
        assert_eq!(paid, receipt.order.total);
    }

    #[test]
    fn lifecycle_stamps_dates_once() {
        let mut order = pending_order(Uuid::new_v4());
        let t1 = Utc::now();
        let t2 = t1 + Duration::hours(1);
        let t3 = t2 + Duration::hours(1);

        advance(&mut order, OrderStatus::Confirmed, None, &Role::Admin, t1).unwrap();
        advance(&mut order, OrderStatus::Shipped, None, &Role::Admin, t2).unwrap();
        advance(&mut order, OrderStatus::Delivered, None, &Role::Admin, t3).unwrap();

        assert_eq!(order.confirmed_date, Some(t1));
        assert_eq!(order.shipped_date, Some(t2));
        assert_eq!(order.delivered_date, Some(t3));
        assert_eq!(order.version, 4);
    }

    #[test]
    fn skipping_a_step_fails_and_changes_nothing() {
        let mut order = pending_order(Uuid::new_v4());
        let err = advance(&mut order, OrderStatus::Shipped, None, &Role::Admin, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped
            }
        ));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.shipped_date.is_none());
        assert_eq!(order.version, 1);
    }

    #[test]
    fn cancel_records_reason_with_default() {
        let shop_id = Uuid::new_v4();
        let mut order = pending_order(shop_id);
        advance(&mut order, OrderStatus::Cancelled, Some("  "), &Role::Shop { shop_id }, Utc::now()).unwrap();
        assert_eq!(order.cancellation_reason.as_deref(), Some("Cancelled by shop"));
        assert!(order.cancelled_date.is_some());

        let mut confirmed = pending_order(shop_id);
        advance(&mut confirmed, OrderStatus::Confirmed, None, &Role::Admin, Utc::now()).unwrap();
        assert!(advance(&mut confirmed, OrderStatus::Cancelled, None, &Role::Admin, Utc::now()).is_err());
        assert!(confirmed.confirmed_date.is_some());
    }

    #[test]
    fn change_status_enforces_actor_and_version() {
        let shop_id = Uuid::new_v4();
        let order = pending_order(shop_id);
        let order_id = order.id;
        let other_shop = user(Role::Shop {
            shop_id: Uuid::new_v4(),
        });
        let storefront = Storefront {
            orders: vec![order],
            ..Default::default()
        };
        let request = UpdateOrderStatusRequest {
            status: OrderStatus::Confirmed,
            reason: None,
            expected_version: None,
        };

        let mut outsider = Draft::new(
            storefront.clone(),
            Some(Session::start(&other_shop, Utc::now())),
        );
        assert!(matches!(
            change_status(&mut outsider, order_id, &request, Utc::now()),
            Err(AppError::Forbidden)
        ));

        let owner = user(Role::Shop { shop_id });
        let mut draft = Draft::new(storefront, Some(Session::start(&owner, Utc::now())));
        let stale = UpdateOrderStatusRequest {
            expected_version: Some(7),
            ..request
        };
        assert!(matches!(
            change_status(&mut draft, order_id, &stale, Utc::now()),
            Err(AppError::Conflict { expected: 7, actual: 1 })
        ));

        let fresh = UpdateOrderStatusRequest {
            status: OrderStatus::Confirmed,
            reason: None,
            expected_version: Some(1),
        };
        let updated = change_status(&mut draft, order_id, &fresh, Utc::now()).unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(updated.version, 2);
        assert_eq!(draft.storefront().notifications.customer.len(), 1);
    }

    struct Surcharge(i64);

    impl PricingPolicy for Surcharge {
        fn unit_price(&self, line: &CartLine) -> i64 {
            line.price.saturating_add(self.0)
        }
    }

    #[test]
    fn checkout_fails_when_total_cannot_be_priced() {
        let (mut draft, ..) = two_shop_draft();
        let result = place_order(
            &mut draft,
            &Surcharge(i64::MAX / 2),
            CheckoutRequest::default(),
            Utc::now(),
        );

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(draft.storefront().orders.is_empty());
        assert!(draft.storefront().payments.is_empty());
        assert_eq!(draft.session().map(|s| s.cart.len()), Some(2));
    }

    #[test]
    fn priced_total_matches_line_sum() {
        let (draft, ..) = two_shop_draft();
        let cart = &draft.session().unwrap().cart;
        assert_eq!(priced_total(&ListPrice, cart).unwrap(), 250_000);
    }
}
