use crate::components::reminders::Reminders;
use crate::components::telegram::TelegramActor;
use crate::components::ComponentManager;
use crate::config::Config;
use crate::error::Error;
use crate::shutdown;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Wire up the actors and components, then wait for shutdown
pub async fn run(config: Arc<RwLock<Config>>) -> miette::Result<()> {
    // Start the Telegram delivery actor
    let (mut telegram_actor, telegram_handle) = TelegramActor::new(Arc::clone(&config));

    tokio::spawn(async move {
        telegram_actor.run().await;
    });

    // Register components
    let mut component_manager = ComponentManager::new(Arc::clone(&config));
    component_manager.register(Reminders::new());
    let component_manager = Arc::new(component_manager);

    // Create shutdown channel
    let (shutdown_send, shutdown_recv) = oneshot::channel();

    // Clone handles for the shutdown handler
    let shutdown_telegram = telegram_handle.clone();
    let shutdown_components = Arc::clone(&component_manager);

    // Spawn signal handler task
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, shutdown_components, shutdown_telegram).await;
    });

    component_manager.init_all(telegram_handle).await?;

    info!("Watching the calendar, send SIGINT or SIGTERM to stop");

    match shutdown_recv.await {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Shutdown channel closed unexpectedly: {}", e);
            Err(Error::Other(format!("Shutdown channel closed: {}", e)).into())
        }
    }
}
