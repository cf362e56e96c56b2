use anyhow::Context;
use chrono::{Duration, Utc};
use storefront_api::{
    config::AppConfig,
    dto::{
        auth::LoginRequest,
        products::CreateProductRequest,
        promotions::CreatePromotionRequest,
        shops::CreateShopRequest,
    },
    middleware::auth::{AuthUser, decode_token},
    models::PromotionType,
    services::{admin_service, auth_service, product_service, promotion_service},
    state::AppState,
};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin123";
const SHOP_PASSWORD: &str = "shop123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    if config.database_url.is_none() {
        println!("DATABASE_URL is not set: seeding the in-memory store, nothing will persist");
    }
    let admin_email = config.admin_email.clone().unwrap_or_else(|| ADMIN_EMAIL.to_string());
    let admin_password = config
        .admin_password
        .clone()
        .unwrap_or_else(|| ADMIN_PASSWORD.to_string());

    let state = AppState::from_config(config).await?;
    let admin_id = auth_service::ensure_admin(&state, &admin_email, &admin_password).await?;

    if state.read(|s| !s.shops.is_empty()).await {
        println!("Store already has shops, skipping demo data. Admin ID: {admin_id}");
        return Ok(());
    }

    let admin = sign_in(&state, &admin_email, &admin_password).await?;
    let shops = [
        ("Ferris Outfitters", "Ferris", "ferris@example.com"),
        ("Async Books", "Tokio", "books@example.com"),
    ];
    for (name, owner, email) in shops {
        admin_service::create_shop(
            &state,
            &admin,
            CreateShopRequest {
                name: name.into(),
                owner: owner.into(),
                email: email.into(),
                password: SHOP_PASSWORD.into(),
            },
        )
        .await?;
    }

    let catalog = [
        ("ferris@example.com", "Axum Hoodie", "Warm hoodie for Rustaceans", 550_000, "apparel"),
        ("ferris@example.com", "Ferris Mug", "Coffee tastes better with Ferris", 120_000, "kitchen"),
        ("ferris@example.com", "Rust Sticker Pack", "Decorate your laptop", 50_000, "accessories"),
        ("books@example.com", "E-book: Async Rust", "Learn async Rust patterns", 250_000, "books"),
    ];
    for (shop_email, name, description, price, category) in catalog {
        let shop = sign_in(&state, shop_email, SHOP_PASSWORD).await?;
        let product = product_service::add_product(
            &state,
            &shop,
            CreateProductRequest {
                name: name.into(),
                description: Some(description.into()),
                image: None,
                price,
                category: category.into(),
            },
        )
        .await?
        .into_data()
        .context("product missing from response")?;
        auth_service::logout_user(&state, &shop).await?;

        product_service::approve_product(&state, &admin, product.id).await?;
    }

    let now = Utc::now();
    promotion_service::create_promotion(
        &state,
        &admin,
        CreatePromotionRequest {
            name: "Launch week".into(),
            kind: PromotionType::Percentage,
            value: 10,
            min_order_value: 100_000,
            max_discount: Some(50_000),
            start_date: now,
            end_date: now + Duration::days(7),
            max_usage: Some(500),
            applicable_products: vec![],
            applicable_users: vec![],
        },
    )
    .await?;
    auth_service::logout_user(&state, &admin).await?;

    println!("Seed completed. Admin ID: {admin_id}");
    Ok(())
}

async fn sign_in(state: &AppState, email: &str, password: &str) -> anyhow::Result<AuthUser> {
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
    .context("login response without data")?;
    let token = login.token.trim_start_matches("Bearer ");
    Ok(decode_token(token, &state.config.jwt_secret)?)
}
