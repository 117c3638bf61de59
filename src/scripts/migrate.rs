use geoml_backend::config::AppConfig;
use geoml_backend::store::PostgresStore;

/// Apply pending schema migrations and exit.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    let database_url = config.database_url()?;

    println!("Connecting to PostgreSQL...");
    let store = PostgresStore::new(&database_url, 1).await?;

    println!("Running database migrations...");
    store.migrate().await?;
    println!("Database schema is up to date");

    Ok(())
}
