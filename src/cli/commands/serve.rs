use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

use crate::config::{AppConfig, initialize_app_state};
use crate::router::create_router;

pub async fn serve(database_url: &str, bind_address: &str) -> Result<()> {
    trace!("Entering serve function");
    info!("FinFlow application starting up");
    debug!("Database URL: {}", database_url);
    debug!("Bind address: {}", bind_address);

    let config = AppConfig::load()?;

    // Initialize application state
    trace!("Initializing application state");
    let (state, _worker) = match initialize_app_state(database_url, &config).await {
        Ok(initialized) => {
            debug!("Application state initialized successfully");
            initialized
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    let mut scheduler = if config.jobs.scheduler_enabled {
        trace!("Starting job scheduler");
        match jobs::start_cron(state.jobs.clone(), &config.jobs.schedule()).await {
            Ok(scheduler) => Some(scheduler),
            Err(e) => {
                error!("Failed to start job scheduler: {}", e);
                return Err(e.into());
            }
        }
    } else {
        warn!("Job scheduler disabled, periodic jobs only run on demand");
        None
    };

    // Create router
    trace!("Creating application router");
    let app = create_router(state);
    debug!("Router created successfully");

    // Start server
    info!("Starting server on {}", bind_address);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            debug!("Successfully bound to address: {}", bind_address);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("FinFlow API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            warn!("Job scheduler did not shut down cleanly: {}", e);
        }
    }

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
