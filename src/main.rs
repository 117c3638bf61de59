use geoml_backend::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    println!("GeoML: feedback and training backend");

    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}, store={:?}",
        config.server.host, config.server.port, config.database.backend
    );

    geoml_backend::run_server(&config).await
}
