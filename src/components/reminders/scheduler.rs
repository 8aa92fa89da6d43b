use super::notifications::send_reminder;
use super::registry::PendingRegistry;
use super::{EventSource, ReminderSink};
use crate::components::caldav::CalendarEvent;
use crate::error::BotResult;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Run the reconciliation loop until shutdown.
///
/// Each cycle fetches the calendar, schedules a reminder task for every event
/// key not yet in the registry, then sleeps for the refetch interval. A fetch
/// failure only skips that cycle.
pub async fn run_reconciliation_loop(
    interval: Duration,
    template: String,
    source: Arc<dyn EventSource>,
    sink: Arc<dyn ReminderSink>,
    registry: PendingRegistry,
    tracker: TaskTracker,
    token: CancellationToken,
) {
    info!(
        "Starting the event scheduler (refetch interval {}s)",
        interval.as_secs()
    );

    loop {
        if let Err(e) = run_cycle(&template, &source, &sink, &registry, &tracker, &token).await {
            error!("Calendar fetch failed, retrying next cycle: {:?}", e);
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = token.cancelled() => {
                info!("Event scheduler stopped");
                break;
            }
        }
    }
}

/// One fetch-and-diff pass: fetch events, schedule the ones not already
/// pending, and report how many were newly scheduled.
pub async fn run_cycle(
    template: &str,
    source: &Arc<dyn EventSource>,
    sink: &Arc<dyn ReminderSink>,
    registry: &PendingRegistry,
    tracker: &TaskTracker,
    token: &CancellationToken,
) -> BotResult<usize> {
    info!("Fetching updated events...");
    let events = source.fetch_events().await?;

    let mut new_events = 0;
    for event in events {
        if registry.insert(event.key()) {
            new_events += 1;
            info!("Found new event: {} at {}", event.summary, event.start);

            tracker.spawn(schedule_reminder(
                event,
                template.to_string(),
                registry.clone(),
                Arc::clone(sink),
                token.clone(),
            ));
        }
    }

    if new_events == 0 {
        info!("No new events found.");
    } else {
        info!("Found {} new events.", new_events);
    }

    Ok(new_events)
}

/// Wait until the event's start time, then deliver its reminder.
///
/// Stale events (start time already passed) fire nothing; their key stays in
/// the registry so later cycles do not schedule them again. The key existence
/// check after the wait is a safety net against the key having been removed
/// by another path in the meantime.
pub async fn schedule_reminder(
    event: CalendarEvent,
    template: String,
    registry: PendingRegistry,
    sink: Arc<dyn ReminderSink>,
    token: CancellationToken,
) {
    let delay = event.start - Utc::now();
    if delay <= chrono::TimeDelta::zero() {
        debug!(
            "Skipping stale event '{}' ({} already passed)",
            event.summary, event.start
        );
        return;
    }
    let wait = delay.to_std().unwrap_or(Duration::ZERO);

    info!(
        "Reminder for '{}' scheduled in {}s",
        event.summary,
        wait.as_secs()
    );

    tokio::select! {
        _ = sleep(wait) => {}
        _ = token.cancelled() => {
            debug!("Reminder for '{}' cancelled during shutdown", event.summary);
            return;
        }
    }

    let key = event.key();
    if registry.contains(&key) {
        send_reminder(sink.as_ref(), &template, &event).await;
        registry.remove(&key);
    }
}
