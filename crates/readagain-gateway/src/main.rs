use std::{net::SocketAddr, sync::Arc};

use anyhow::Result as AnyResult;
use readagain_earnings::EarningsService;
use readagain_platform::{
    PgLedgerStore, RedisBus, ServiceConfig, apply_schema, connect_database,
};
use tracing::info;

mod auth;
mod error;
mod routes;

use routes::AppState;

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "readagain_gateway=info,readagain_earnings=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url).await?;
    apply_schema(&pool).await?;
    let bus = RedisBus::connect(&config.redis_url)?;

    let state = AppState {
        earnings: EarningsService::new(Arc::new(PgLedgerStore::new(pool))),
        bus: Some(bus),
    };

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}
