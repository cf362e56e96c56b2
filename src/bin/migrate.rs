use anyhow::Context;
use storefront_api::{
    config::AppConfig,
    db::{MIGRATIONS_DIR, create_orm_conn, run_migrations},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let database_url = config
        .database_url
        .context("DATABASE_URL is required to run migrations")?;
    let orm = create_orm_conn(&database_url).await?;
    let applied = run_migrations(&orm, MIGRATIONS_DIR).await?;
    println!("Migrations applied ({applied} files)");
    Ok(())
}
