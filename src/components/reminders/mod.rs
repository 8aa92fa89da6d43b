mod notifications;
pub mod registry;
pub mod scheduler;

pub use notifications::render_reminder;
pub use registry::PendingRegistry;

use crate::components::caldav::{CalDavHandle, CalendarEvent};
use crate::components::telegram::TelegramHandle;
use crate::config::Config;
use crate::error::BotResult;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Source of calendar events for the reconciliation loop
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    async fn fetch_events(&self) -> BotResult<Vec<CalendarEvent>>;
}

/// Destination for rendered reminder messages
#[async_trait]
pub trait ReminderSink: Send + Sync + 'static {
    async fn deliver(&self, text: String) -> BotResult<()>;
}

/// Reminders component: owns the pending registry and the task set of the
/// reconciliation loop plus every in-flight reminder
pub struct Reminders {
    registry: PendingRegistry,
    tracker: TaskTracker,
    token: CancellationToken,
    caldav: RwLock<Option<CalDavHandle>>,
}

impl Reminders {
    /// Create a new reminders component
    pub fn new() -> Self {
        Self {
            registry: PendingRegistry::new(),
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
            caldav: RwLock::new(None),
        }
    }

    /// Registry of event keys with an outstanding reminder
    pub fn registry(&self) -> PendingRegistry {
        self.registry.clone()
    }
}

impl Default for Reminders {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Component for Reminders {
    fn name(&self) -> &'static str {
        "reminders"
    }

    async fn init(
        &self,
        config: Arc<RwLock<Config>>,
        telegram_handle: TelegramHandle,
    ) -> BotResult<()> {
        let (interval, template) = {
            let config_read = config.read().await;
            (
                config_read.refetch_interval,
                config_read.message_template.clone(),
            )
        };

        let handle = CalDavHandle::new(Arc::clone(&config));
        *self.caldav.write().await = Some(handle.clone());

        let source: Arc<dyn EventSource> = Arc::new(handle);
        let sink: Arc<dyn ReminderSink> = Arc::new(telegram_handle);

        self.tracker.spawn(scheduler::run_reconciliation_loop(
            Duration::from_secs(interval),
            template,
            source,
            sink,
            self.registry.clone(),
            self.tracker.clone(),
            self.token.clone(),
        ));

        Ok(())
    }

    async fn shutdown(&self) -> BotResult<()> {
        info!(
            "Stopping reminders with {} task(s) in flight",
            self.tracker.len()
        );

        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        let handle = { self.caldav.read().await.clone() };
        if let Some(handle) = handle {
            handle.shutdown().await?;
        }

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
