use axum::{
    routing::{get, post},
    Router,
};
use clickpay_gateway::api::{self, AppState};
use clickpay_gateway::config::Config;
use clickpay_gateway::gateway::OffsiteGateway;
use clickpay_gateway::processor::ClickpayHttpClient;
use clickpay_gateway::store::{init_pool, PgOrderStore, PgPaymentStore};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Log startup info
    tracing::info!("Starting Clickpay Gateway");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Region: {:?}", config.gateway.region);
    tracing::info!("Pay page mode: {:?}", config.gateway.pay_page_mode);

    // Storage
    let pool = init_pool(&config.database.url, config.database.max_connections).await?;
    let payments = Arc::new(PgPaymentStore::new(pool.clone()));
    let orders = Arc::new(PgOrderStore::new(pool));

    // Processor client and gateway
    let processor = Arc::new(ClickpayHttpClient::new(&config.gateway)?);
    let gateway = Arc::new(OffsiteGateway::new(
        config.gateway.clone(),
        processor,
        payments,
        orders,
    ));

    let state = AppState {
        config: config.clone(),
        gateway,
    };

    // Build router
    let app = Router::new()
        .route("/health", get(api::health::health_check))
        .route(
            "/payment/return/:order_id",
            post(api::callbacks::payment_return),
        )
        .route(
            "/payment/notify/:gateway_id",
            post(api::callbacks::payment_notify),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
