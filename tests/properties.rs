use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use proptest::prelude::*;
use proptest::test_runner::Config;
use storefront_api::{
    dto::orders::CheckoutRequest,
    models::{MAX_LINE_QUANTITY, Product, ProductStatus, Role, User},
    services::{
        cart_service::add_line,
        order_service::{ListPrice, place_order},
        product_service::visible_products,
    },
    session::Session,
    storefront::{Draft, Storefront},
};
use uuid::Uuid;

fn customer_session() -> Session {
    let user = User {
        id: Uuid::new_v4(),
        email: "prop@example.com".into(),
        password_hash: String::new(),
        role: Role::Customer,
        name: None,
        phone: None,
        address: None,
        created_at: Utc::now(),
    };
    Session::start(&user, Utc::now())
}

fn product(shop_id: Uuid, price: i64, status: ProductStatus) -> Product {
    Product {
        id: Uuid::new_v4(),
        shop_id,
        name: "Item".into(),
        description: None,
        image: None,
        price,
        category: "misc".into(),
        status,
        rejection_reason: None,
        submitted_at: Utc::now(),
        reviewed_at: None,
    }
}

fn status_strategy() -> impl Strategy<Value = ProductStatus> {
    prop_oneof![
        Just(ProductStatus::Pending),
        Just(ProductStatus::Approved),
        Just(ProductStatus::Rejected),
    ]
}

proptest! {
    #![proptest_config(Config::with_cases(128))]

    #[test]
    fn repeated_adds_merge_into_one_line(q1 in 1_i64..1_000, q2 in 1_i64..1_000) {
        let mut session = customer_session();
        let item = product(Uuid::new_v4(), 1_000, ProductStatus::Approved);

        add_line(Some(&mut session), &item, q1).expect("first add");
        add_line(Some(&mut session), &item, q2).expect("second add");

        prop_assert_eq!(session.cart.len(), 1);
        prop_assert_eq!(session.cart[0].quantity, q1 + q2);
    }

    #[test]
    fn cart_stays_bounded_and_priceable(
        price in 1_i64..i64::MAX,
        adds in prop::collection::vec(1_i64..i64::MAX, 1..6),
    ) {
        let mut session = customer_session();
        let item = product(Uuid::new_v4(), price, ProductStatus::Approved);

        for quantity in adds {
            let before = session.cart.clone();
            if add_line(Some(&mut session), &item, quantity).is_err() {
                prop_assert_eq!(&session.cart, &before);
            }
            prop_assert!(session.cart.iter().all(|l| l.quantity <= MAX_LINE_QUANTITY));
            prop_assert!(session.cart_total().is_some());
        }
    }

    #[test]
    fn payments_sum_to_order_total(
        lines in prop::collection::vec((0_usize..4, 1_i64..500_000, 1_i64..20), 1..12)
    ) {
        let shops: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut session = customer_session();
        for (shop, price, quantity) in &lines {
            let item = product(shops[*shop], *price, ProductStatus::Approved);
            add_line(Some(&mut session), &item, *quantity).expect("add");
        }

        let mut draft = Draft::new(Storefront::default(), Some(session));
        let receipt = place_order(&mut draft, &ListPrice, CheckoutRequest::default(), Utc::now())
            .expect("checkout");

        let expected: i64 = lines.iter().map(|(_, price, qty)| price * qty).sum();
        prop_assert_eq!(receipt.order.total, expected);
        prop_assert_eq!(receipt.payments.iter().map(|p| p.amount).sum::<i64>(), expected);

        let mut per_shop: BTreeMap<Uuid, usize> = BTreeMap::new();
        for payment in &receipt.payments {
            *per_shop.entry(payment.shop_id).or_default() += 1;
            prop_assert_eq!(payment.order_id, receipt.order.id);
        }
        prop_assert!(per_shop.values().all(|count| *count == 1));

        let order_shops: BTreeSet<Uuid> = receipt.order.shop_ids.iter().copied().collect();
        let cart_shops: BTreeSet<Uuid> = lines.iter().map(|(shop, _, _)| shops[*shop]).collect();
        prop_assert_eq!(order_shops.len(), receipt.order.shop_ids.len());
        prop_assert_eq!(per_shop.keys().copied().collect::<BTreeSet<_>>(), order_shops.clone());
        prop_assert_eq!(order_shops, cart_shops);
    }

    #[test]
    fn customers_see_exactly_the_approved_subset(
        statuses in prop::collection::vec(status_strategy(), 0..30)
    ) {
        let products: Vec<Product> = statuses
            .iter()
            .map(|status| product(Uuid::new_v4(), 100, *status))
            .collect();
        let approved = statuses.iter().filter(|s| **s == ProductStatus::Approved).count();

        let visible = visible_products(&products, Some(&Role::Customer));
        prop_assert_eq!(visible.len(), approved);
        prop_assert!(visible.iter().all(|p| p.is_approved()));
        prop_assert_eq!(visible_products(&products, None).len(), approved);
        prop_assert_eq!(visible_products(&products, Some(&Role::Admin)).len(), products.len());
    }
}
