use std::collections::BTreeSet;

use storefront_api::{
    config::AppConfig,
    dto::{
        auth::{LoginRequest, RegisterRequest},
        cart::AddToCartRequest,
        orders::{CheckoutRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, UpdateProductRequest},
        shops::CreateShopRequest,
    },
    error::{AppError, Guard},
    middleware::auth::{AuthUser, decode_token},
    models::{NotificationType, OrderStatus, Product, ProductStatus},
    routes::params::{OrderListQuery, ProductQuery},
    services::{
        admin_service, auth_service, cart_service, notification_service, order_service,
        product_service, shop_service,
    },
    state::AppState,
    store::{MemoryStore, StoreBackend},
};
use uuid::Uuid;

const ADMIN_EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "secret123";

async fn memory_state() -> AppState {
    AppState::in_memory(AppConfig::for_memory("flow-secret"))
        .await
        .expect("memory state")
}

async fn sign_in(state: &AppState, email: &str, password: &str) -> Result<AuthUser, AppError> {
    let login = auth_service::login_user(
        state,
        None,
        LoginRequest {
            email: email.into(),
            password: password.into(),
        },
    )
    .await?
    .into_data()
    .expect("login data");
    decode_token(
        login.token.trim_start_matches("Bearer "),
        &state.config.jwt_secret,
    )
}

async fn bootstrap_admin(state: &AppState) -> AuthUser {
    auth_service::ensure_admin(state, ADMIN_EMAIL, PASSWORD)
        .await
        .expect("admin bootstrap");
    sign_in(state, ADMIN_EMAIL, PASSWORD).await.expect("admin login")
}

async fn sign_up(state: &AppState, email: &str) -> AuthUser {
    auth_service::register_user(
        state,
        RegisterRequest {
            email: email.into(),
            password: PASSWORD.into(),
        },
    )
    .await
    .expect("register");
    sign_in(state, email, PASSWORD).await.expect("customer login")
}

async fn open_shop(state: &AppState, admin: &AuthUser, email: &str) -> (Uuid, AuthUser) {
    let account = admin_service::create_shop(
        state,
        admin,
        CreateShopRequest {
            name: format!("Shop {email}"),
            owner: "Owner".into(),
            email: email.into(),
            password: PASSWORD.into(),
        },
    )
    .await
    .expect("create shop")
    .into_data()
    .expect("shop account");
    let user = sign_in(state, email, PASSWORD).await.expect("shop login");
    (account.shop.id, user)
}

async fn submit(state: &AppState, shop: &AuthUser, name: &str, price: i64) -> Product {
    product_service::add_product(
        state,
        shop,
        CreateProductRequest {
            name: name.into(),
            description: None,
            image: None,
            price,
            category: "general".into(),
        },
    )
    .await
    .expect("add product")
    .into_data()
    .expect("product")
}

async fn approved(state: &AppState, admin: &AuthUser, shop: &AuthUser, name: &str, price: i64) -> Product {
    let product = submit(state, shop, name, price).await;
    product_service::approve_product(state, admin, product.id)
        .await
        .expect("approve")
        .into_data()
        .expect("approved product")
}

async fn add(state: &AppState, user: Option<&AuthUser>, product_id: Uuid, quantity: i64) -> Result<(), AppError> {
    cart_service::add_to_cart(
        state,
        user,
        AddToCartRequest {
            product_id,
            quantity,
        },
    )
    .await
    .map(|_| ())
}

async fn cart_len(state: &AppState, user: &AuthUser) -> usize {
    cart_service::get_cart(state, user)
        .await
        .expect("cart")
        .into_data()
        .expect("cart data")
        .items
        .len()
}

fn status(status: OrderStatus) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status,
        reason: None,
        expected_version: None,
    }
}

#[tokio::test]
async fn checkout_splits_cart_into_one_payment_per_shop() {
    let state = memory_state().await;
    let admin = bootstrap_admin(&state).await;
    let (s1, shop1) = open_shop(&state, &admin, "s1@example.com").await;
    let (s2, shop2) = open_shop(&state, &admin, "s2@example.com").await;
    let p1 = approved(&state, &admin, &shop1, "Kettle", 100_000).await;
    let p2 = approved(&state, &admin, &shop2, "Teapot", 50_000).await;
    let customer = sign_up(&state, "c@example.com").await;

    add(&state, Some(&customer), p1.id, 2).await.unwrap();
    add(&state, Some(&customer), p2.id, 1).await.unwrap();
    let order_alerts_before = state
        .read(|s| s.notifications.shop.iter().filter(|n| n.kind == NotificationType::Order).count())
        .await;

    let receipt = order_service::checkout(&state, &customer, CheckoutRequest::default())
        .await
        .unwrap()
        .into_data()
        .unwrap();

    assert_eq!(receipt.order.total, 250_000);
    assert_eq!(receipt.order.shop_ids, vec![s1, s2]);
    assert_eq!(receipt.payments.len(), 2);
    let amounts: Vec<(Uuid, i64)> = receipt.payments.iter().map(|p| (p.shop_id, p.amount)).collect();
    assert!(amounts.contains(&(s1, 200_000)));
    assert!(amounts.contains(&(s2, 50_000)));
    assert_eq!(
        receipt.payments.iter().map(|p| p.amount).sum::<i64>(),
        receipt.order.total
    );
    let payment_shops: BTreeSet<Uuid> = receipt.payments.iter().map(|p| p.shop_id).collect();
    let order_shops: BTreeSet<Uuid> = receipt.order.shop_ids.iter().copied().collect();
    assert_eq!(payment_shops, order_shops);

    assert_eq!(cart_len(&state, &customer).await, 0);
    let order_alerts_after = state
        .read(|s| s.notifications.shop.iter().filter(|n| n.kind == NotificationType::Order).count())
        .await;
    assert_eq!(order_alerts_after - order_alerts_before, 1);

    let mine = order_service::current_orders(&state, &customer, OrderListQuery::default())
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(mine.items.len(), 1);

    let shop1_payments = shop_service::shop_payments(&state, &shop1)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(shop1_payments.items.len(), 1);
    assert_eq!(shop1_payments.items[0].amount, 200_000);

    let stranger = sign_up(&state, "other@example.com").await;
    assert!(matches!(
        order_service::get_order(&state, &stranger, receipt.order.id).await,
        Err(AppError::NotFound)
    ));
    let seen_by_shop = order_service::get_order(&state, &shop2, receipt.order.id)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(seen_by_shop.payments.len(), 2);
}

#[tokio::test]
async fn checkout_requires_items_and_a_customer() {
    let state = memory_state().await;
    let admin = bootstrap_admin(&state).await;
    let customer = sign_up(&state, "c@example.com").await;

    assert!(matches!(
        order_service::checkout(&state, &customer, CheckoutRequest::default()).await,
        Err(AppError::EmptyCart)
    ));
    assert!(matches!(
        order_service::checkout(&state, &admin, CheckoutRequest::default()).await,
        Err(AppError::GuardViolation(Guard::WrongRole))
    ));
}

#[tokio::test]
async fn failed_checkout_write_leaves_everything_as_it_was() {
    let store = MemoryStore::new();
    let state = AppState::new(
        StoreBackend::from(store.clone()),
        AppConfig::for_memory("flow-secret"),
    )
    .await
    .expect("memory state");
    let admin = bootstrap_admin(&state).await;
    let (_, shop1) = open_shop(&state, &admin, "s1@example.com").await;
    let (_, shop2) = open_shop(&state, &admin, "s2@example.com").await;
    let p1 = approved(&state, &admin, &shop1, "Kettle", 100_000).await;
    let p2 = approved(&state, &admin, &shop2, "Teapot", 50_000).await;
    let customer = sign_up(&state, "c@example.com").await;
    add(&state, Some(&customer), p1.id, 2).await.unwrap();
    add(&state, Some(&customer), p2.id, 1).await.unwrap();
    let shop_alerts_before = state.read(|s| s.notifications.shop.len()).await;

    store.set_read_only(true);
    assert!(matches!(
        order_service::checkout(&state, &customer, CheckoutRequest::default()).await,
        Err(AppError::Storage(_))
    ));

    let (orders, payments, shop_alerts) = state
        .read(|s| (s.orders.len(), s.payments.len(), s.notifications.shop.len()))
        .await;
    assert_eq!(orders, 0);
    assert_eq!(payments, 0);
    assert_eq!(shop_alerts, shop_alerts_before);

    let cart = cart_service::get_cart(&state, &customer)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total, 250_000);

    store.set_read_only(false);
    let receipt = order_service::checkout(&state, &customer, CheckoutRequest::default())
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(receipt.order.total, 250_000);
}

#[tokio::test]
async fn cart_guards_leave_cart_untouched() {
    let state = memory_state().await;
    let admin = bootstrap_admin(&state).await;
    let (_, shop_user) = open_shop(&state, &admin, "s@example.com").await;
    let pending = submit(&state, &shop_user, "Draft lamp", 10_000).await;
    let lamp = approved(&state, &admin, &shop_user, "Lamp", 20_000).await;
    let customer = sign_up(&state, "c@example.com").await;

    assert!(matches!(
        add(&state, None, lamp.id, 1).await,
        Err(AppError::GuardViolation(Guard::SessionMissing))
    ));
    assert!(matches!(
        add(&state, Some(&admin), lamp.id, 1).await,
        Err(AppError::GuardViolation(Guard::WrongRole))
    ));
    assert!(matches!(
        add(&state, Some(&shop_user), lamp.id, 1).await,
        Err(AppError::GuardViolation(Guard::WrongRole))
    ));
    assert!(matches!(
        add(&state, Some(&customer), pending.id, 1).await,
        Err(AppError::GuardViolation(Guard::NotApproved))
    ));
    assert_eq!(cart_len(&state, &customer).await, 0);

    add(&state, Some(&customer), lamp.id, 2).await.unwrap();
    add(&state, Some(&customer), lamp.id, 3).await.unwrap();
    let cart = cart_service::get_cart(&state, &customer)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.total, 100_000);
}

#[tokio::test]
async fn login_failures_share_kind_but_not_message() {
    let state = memory_state().await;
    sign_up(&state, "known@example.com").await;

    let unknown = sign_in(&state, "nobody@example.com", PASSWORD).await.unwrap_err();
    let wrong = sign_in(&state, "known@example.com", "not-it").await.unwrap_err();

    assert!(matches!(unknown, AppError::InvalidCredentials(_)));
    assert!(matches!(wrong, AppError::InvalidCredentials(_)));
    assert_eq!(unknown.kind(), wrong.kind());
    assert_ne!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.to_string(), "No account found with this email");
    assert_eq!(wrong.to_string(), "Incorrect password");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let state = memory_state().await;
    let customer = sign_up(&state, "c@example.com").await;

    auth_service::logout_user(&state, &customer).await.unwrap();
    assert!(matches!(
        auth_service::session_info(&state, &customer).await,
        Err(AppError::Unauthenticated)
    ));
}

#[tokio::test]
async fn customers_only_see_approved_products() {
    let state = memory_state().await;
    let admin = bootstrap_admin(&state).await;
    let (_, shop_user) = open_shop(&state, &admin, "s@example.com").await;
    let pending = submit(&state, &shop_user, "Hidden", 10_000).await;
    approved(&state, &admin, &shop_user, "Shown", 20_000).await;
    let customer = sign_up(&state, "c@example.com").await;

    for viewer in [None, Some(&customer)] {
        let catalog = product_service::list_products(&state, viewer, ProductQuery::default())
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(catalog.items.len(), 1);
        assert_eq!(catalog.items[0].status, ProductStatus::Approved);
        assert!(matches!(
            product_service::get_product(&state, viewer, pending.id).await,
            Err(AppError::NotFound)
        ));
    }

    for staff in [&admin, &shop_user] {
        let catalog = product_service::list_products(&state, Some(staff), ProductQuery::default())
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(catalog.items.len(), 2);
    }
}

#[tokio::test]
async fn order_status_only_moves_forward() {
    let state = memory_state().await;
    let admin = bootstrap_admin(&state).await;
    let (_, shop_user) = open_shop(&state, &admin, "s@example.com").await;
    let lamp = approved(&state, &admin, &shop_user, "Lamp", 20_000).await;
    let customer = sign_up(&state, "c@example.com").await;
    add(&state, Some(&customer), lamp.id, 1).await.unwrap();
    let order = order_service::checkout(&state, &customer, CheckoutRequest::default())
        .await
        .unwrap()
        .into_data()
        .unwrap()
        .order;

    assert!(matches!(
        order_service::set_order_status(&state, &shop_user, order.id, status(OrderStatus::Shipped)).await,
        Err(AppError::InvalidTransition { .. })
    ));
    assert!(matches!(
        order_service::set_order_status(&state, &customer, order.id, status(OrderStatus::Confirmed)).await,
        Err(AppError::Forbidden)
    ));

    let confirmed = order_service::set_order_status(&state, &shop_user, order.id, status(OrderStatus::Confirmed))
        .await
        .unwrap()
        .into_data()
        .unwrap();
    let stale = UpdateOrderStatusRequest {
        expected_version: Some(order.version),
        ..status(OrderStatus::Shipped)
    };
    assert!(matches!(
        order_service::set_order_status(&state, &admin, order.id, stale).await,
        Err(AppError::Conflict { .. })
    ));

    let shipped = order_service::set_order_status(&state, &admin, order.id, status(OrderStatus::Shipped))
        .await
        .unwrap()
        .into_data()
        .unwrap();
    let delivered = order_service::set_order_status(&state, &admin, order.id, status(OrderStatus::Delivered))
        .await
        .unwrap()
        .into_data()
        .unwrap();

    assert_eq!(delivered.confirmed_date, confirmed.confirmed_date);
    assert_eq!(delivered.shipped_date, shipped.shipped_date);
    assert!(delivered.delivered_date.is_some());
    assert!(matches!(
        order_service::set_order_status(&state, &admin, order.id, status(OrderStatus::Cancelled)).await,
        Err(AppError::InvalidTransition { .. })
    ));

    let feed = notification_service::notifications_for_role(&state, &customer)
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(feed.unread, 3);
}

#[tokio::test]
async fn shop_edit_sends_product_back_to_review() {
    let state = memory_state().await;
    let admin = bootstrap_admin(&state).await;
    let (_, shop_user) = open_shop(&state, &admin, "s@example.com").await;
    let (_, rival) = open_shop(&state, &admin, "r@example.com").await;
    let lamp = approved(&state, &admin, &shop_user, "Lamp", 20_000).await;

    let edit = || UpdateProductRequest {
        price: Some(25_000),
        ..Default::default()
    };
    assert!(matches!(
        product_service::update_product(&state, &rival, lamp.id, edit()).await,
        Err(AppError::Forbidden)
    ));

    let revised = product_service::update_product(&state, &shop_user, lamp.id, edit())
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(revised.status, ProductStatus::Pending);
    assert_eq!(revised.price, 25_000);
    assert!(matches!(
        product_service::get_product(&state, None, lamp.id).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn deleting_a_shop_cascades_and_keeps_history() {
    let state = memory_state().await;
    let admin = bootstrap_admin(&state).await;
    let (shop_id, shop_user) = open_shop(&state, &admin, "s@example.com").await;
    let lamp = approved(&state, &admin, &shop_user, "Lamp", 20_000).await;
    let customer = sign_up(&state, "c@example.com").await;
    add(&state, Some(&customer), lamp.id, 1).await.unwrap();
    order_service::checkout(&state, &customer, CheckoutRequest::default())
        .await
        .unwrap();

    admin_service::delete_shop(&state, &admin, shop_id).await.unwrap();

    let (shops, products, orders, payments, operator) = state
        .read(|s| {
            (
                s.shops.len(),
                s.products.len(),
                s.orders.len(),
                s.payments.len(),
                s.user(shop_user.user_id).is_some(),
            )
        })
        .await;
    assert_eq!((shops, products), (0, 0));
    assert_eq!((orders, payments), (1, 1));
    assert!(!operator);
    assert!(matches!(
        shop_service::shop_payments(&state, &shop_user).await,
        Err(AppError::Unauthenticated)
    ));

    assert!(matches!(
        admin_service::delete_user(&state, &admin, admin.user_id).await,
        Err(AppError::Validation(_))
    ));
}
