use axum::serve;
use oteapi_optimade::api::routes::create_router;
use oteapi_optimade::app_state;
use oteapi_optimade::config::AppConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .parse_default_env() // RUST_LOG overrides the defaults above
        .init();

    println!("OTEAPI OPTIMADE: response parsing and structure mapping service");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}, cache tag={}",
        config.server.host, config.server.port, config.cache.tag
    );

    let state = app_state(&config)?;
    run_server(create_router().with_state(state), &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!("OTEAPI OPTIMADE server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
