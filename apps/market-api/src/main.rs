//! # Treido Market API
//!
//! HTTP server for the marketplace storefront.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  market.toml + TREIDO_* env ──► MarketConfig ──► validate              │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │  SQLite (migrations) ◄── Database    PaymentGateway                     │
//! │                             │        (Stripe, or disabled)              │
//! │                             ▼              │                            │
//! │                      CheckoutService ◄─────┘                            │
//! │                             │                                           │
//! │                             ▼                                           │
//! │                  axum Router on server.bind_address()                   │
//! │                  until Ctrl+C / SIGTERM                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `market-api [CONFIG_PATH]`

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use treido_db::{Database, DbConfig};
use treido_market::payment::{DisabledPayments, PaymentGateway, StripeGateway};
use treido_market::{init_tracing, router, AppState, CheckoutService, MarketConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("Starting Treido Market API...");

    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = MarketConfig::load(config_path)?;
    info!(
        bind = %config.server.bind_address(),
        database = %config.database.path.display(),
        payments = config.payments.enabled,
        "Configuration loaded"
    );

    // Connect to database
    let db = Database::new(DbConfig::new(&config.database.path).max_connections(config.database.max_connections)).await?;
    info!("Database ready");

    let gateway: Arc<dyn PaymentGateway> = if config.payments.enabled {
        Arc::new(StripeGateway::from_settings(&config.payments))
    } else {
        warn!("Payments disabled, checkout sessions will fail");
        Arc::new(DisabledPayments)
    };

    let checkout = CheckoutService::new(db.clone(), gateway, &config.payments);
    let bind_address = config.server.bind_address();
    let state = Arc::new(AppState {
        db: db.clone(),
        checkout,
        config,
    });

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(addr = %bind_address, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
