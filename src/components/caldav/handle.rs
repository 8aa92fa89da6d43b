use super::actor::{CalDavActor, CalDavActorHandle};
use super::models::CalendarEvent;
use crate::components::reminders::EventSource;
use crate::config::Config;
use crate::error::BotResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Handle for interacting with the CalDAV actor
#[derive(Clone)]
pub struct CalDavHandle {
    actor_handle: CalDavActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl CalDavHandle {
    /// Create a new CalDavHandle and spawn the actor
    pub fn new(config: Arc<RwLock<Config>>) -> Self {
        let (mut actor, handle) = CalDavActor::new(config);

        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            _actor_task: Arc::new(actor_task),
        }
    }

    /// Fetch the current events of the watched calendar
    pub async fn fetch_events(&self) -> BotResult<Vec<CalendarEvent>> {
        self.actor_handle.fetch_events().await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> BotResult<()> {
        self.actor_handle.shutdown().await
    }
}

#[async_trait]
impl EventSource for CalDavHandle {
    async fn fetch_events(&self) -> BotResult<Vec<CalendarEvent>> {
        CalDavHandle::fetch_events(self).await
    }
}
