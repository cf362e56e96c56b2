use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{Landing, LoginResponse, SessionInfo},
        cart::CartView,
        notifications::NotificationFeed,
        orders::{OrderList, OrderWithPayments, PaymentList},
        reviews::ReviewList,
        shops::ShopAccount,
    },
    models::{
        CartLine, Notification, Order, OrderStatus, Payment, PaymentMethod, Product,
        ProductStatus, Promotion, Review, Role, Shop, SupportRequest, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, health, notifications, orders, params, products, promotions, shop,
        support,
    },
    session::SessionUser,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        auth::update_profile,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::add_review,
        products::list_reviews,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_from_cart,
        orders::list_order,
        orders::checkout,
        orders::get_order,
        orders::update_order_status,
        shop::shop_profile,
        shop::shop_products,
        shop::shop_orders,
        shop::shop_payments,
        admin::list_all_orders,
        admin::list_products,
        admin::approve_product,
        admin::reject_product,
        admin::list_users,
        admin::delete_user,
        admin::list_shops,
        admin::create_shop,
        admin::delete_shop,
        notifications::list_notifications,
        notifications::read_one,
        notifications::read_all,
        support::submit,
        support::list,
        support::resolve,
        promotions::list_active,
        promotions::list_all,
        promotions::create
    ),
    components(
        schemas(
            Role,
            User,
            SessionUser,
            Shop,
            Product,
            ProductStatus,
            CartLine,
            Order,
            OrderStatus,
            Payment,
            PaymentMethod,
            Promotion,
            Review,
            SupportRequest,
            Notification,
            Landing,
            LoginResponse,
            SessionInfo,
            CartView,
            NotificationFeed,
            OrderList,
            OrderWithPayments,
            PaymentList,
            ReviewList,
            ShopAccount,
            params::ProductQuery,
            params::OrderListQuery,
            params::ProductStatusQuery,
            params::SupportQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<OrderWithPayments>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and sessions"),
        (name = "Products", description = "Catalog and reviews"),
        (name = "Cart", description = "Cart of the current session"),
        (name = "Orders", description = "Checkout and order lifecycle"),
        (name = "Shop", description = "Shop back office"),
        (name = "Admin", description = "Moderation and account administration"),
        (name = "Notifications", description = "Role notification feeds"),
        (name = "Support", description = "Support requests"),
        (name = "Promotions", description = "Promotion catalog"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
