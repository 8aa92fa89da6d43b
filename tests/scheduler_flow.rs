use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use muistutin::components::caldav::CalendarEvent;
use muistutin::components::reminders::scheduler::{
    run_cycle, run_reconciliation_loop, schedule_reminder,
};
use muistutin::components::reminders::{EventSource, PendingRegistry, ReminderSink};
use muistutin::config::DEFAULT_MESSAGE_TEMPLATE;
use muistutin::error::{BotResult, Error};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Event source that plays back a scripted list of fetch results, then keeps
/// returning empty event lists
struct ScriptedSource {
    responses: Mutex<VecDeque<BotResult<Vec<CalendarEvent>>>>,
}

impl ScriptedSource {
    fn new(responses: Vec<BotResult<Vec<CalendarEvent>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn fetch_events(&self) -> BotResult<Vec<CalendarEvent>> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Sink that records delivered messages, optionally failing every delivery
struct RecordingSink {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderSink for RecordingSink {
    async fn deliver(&self, text: String) -> BotResult<()> {
        if self.fail {
            return Err(Error::Telegram("chat unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }
}

fn event_in(seconds: i64, summary: &str) -> CalendarEvent {
    CalendarEvent {
        summary: summary.to_string(),
        description: String::new(),
        location: String::new(),
        start: Utc::now() + TimeDelta::seconds(seconds),
    }
}

struct Harness {
    registry: PendingRegistry,
    tracker: TaskTracker,
    token: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        Self {
            registry: PendingRegistry::new(),
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
        }
    }

    async fn cycle(
        &self,
        source: &Arc<dyn EventSource>,
        sink: &Arc<dyn ReminderSink>,
    ) -> BotResult<usize> {
        run_cycle(
            DEFAULT_MESSAGE_TEMPLATE,
            source,
            sink,
            &self.registry,
            &self.tracker,
            &self.token,
        )
        .await
    }

    async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[tokio::test(start_paused = true)]
async fn reminder_fires_once_at_start_time() {
    let harness = Harness::new();
    let source: Arc<dyn EventSource> =
        Arc::new(ScriptedSource::new(vec![Ok(vec![event_in(5, "Standup")])]));
    let sink = Arc::new(RecordingSink::new());
    let sink_dyn: Arc<dyn ReminderSink> = sink.clone();

    let new_events = harness.cycle(&source, &sink_dyn).await.unwrap();
    assert_eq!(new_events, 1);
    assert_eq!(harness.registry.len(), 1);

    harness.drain().await;

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Standup"));
    assert!(harness.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_event_is_never_notified() {
    let harness = Harness::new();
    let source: Arc<dyn EventSource> = Arc::new(ScriptedSource::new(vec![
        Ok(vec![event_in(-10, "Missed")]),
        Ok(vec![event_in(-10, "Missed")]),
    ]));
    let sink = Arc::new(RecordingSink::new());
    let sink_dyn: Arc<dyn ReminderSink> = sink.clone();

    let first = harness.cycle(&source, &sink_dyn).await.unwrap();
    assert_eq!(first, 1);

    harness.drain().await;
    assert!(sink.sent().is_empty());

    // The stale key stays pending so later cycles do not reschedule it
    assert_eq!(harness.registry.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_fetches_schedule_an_event_once() {
    let harness = Harness::new();
    let event = event_in(3600, "Viikkopalaveri");
    let source: Arc<dyn EventSource> = Arc::new(ScriptedSource::new(vec![
        Ok(vec![event.clone()]),
        Ok(vec![event.clone()]),
        Ok(vec![event]),
    ]));
    let sink = Arc::new(RecordingSink::new());
    let sink_dyn: Arc<dyn ReminderSink> = sink.clone();

    assert_eq!(harness.cycle(&source, &sink_dyn).await.unwrap(), 1);
    assert_eq!(harness.cycle(&source, &sink_dyn).await.unwrap(), 0);
    assert_eq!(harness.cycle(&source, &sink_dyn).await.unwrap(), 0);
    assert_eq!(harness.registry.len(), 1);

    harness.drain().await;
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_fetch_schedules_nothing() {
    let harness = Harness::new();
    let source: Arc<dyn EventSource> = Arc::new(ScriptedSource::new(vec![Ok(Vec::new())]));
    let sink = Arc::new(RecordingSink::new());
    let sink_dyn: Arc<dyn ReminderSink> = sink.clone();

    assert_eq!(harness.cycle(&source, &sink_dyn).await.unwrap(), 0);
    assert!(harness.registry.is_empty());

    harness.drain().await;
    assert!(sink.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delivery_failure_still_clears_the_key() {
    let harness = Harness::new();
    let source: Arc<dyn EventSource> =
        Arc::new(ScriptedSource::new(vec![Ok(vec![event_in(2, "Flaky")])]));
    let sink = Arc::new(RecordingSink::failing());
    let sink_dyn: Arc<dyn ReminderSink> = sink.clone();

    harness.cycle(&source, &sink_dyn).await.unwrap();
    harness.drain().await;

    // The failure is swallowed and the key is removed regardless
    assert!(sink.sent().is_empty());
    assert!(harness.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_skips_the_cycle_and_the_loop_goes_on() {
    let registry = PendingRegistry::new();
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    let source: Arc<dyn EventSource> = Arc::new(ScriptedSource::new(vec![
        Err(Error::CalDav("connection refused".to_string())),
        Ok(vec![event_in(2, "After failure")]),
    ]));
    let sink = Arc::new(RecordingSink::new());
    let sink_dyn: Arc<dyn ReminderSink> = sink.clone();

    tracker.spawn(run_reconciliation_loop(
        Duration::from_secs(30),
        DEFAULT_MESSAGE_TEMPLATE.to_string(),
        source,
        sink_dyn,
        registry.clone(),
        tracker.clone(),
        token.clone(),
    ));

    // Enough virtual time for the failing cycle, the retry and the reminder
    tokio::time::sleep(Duration::from_secs(120)).await;

    token.cancel();
    tracker.close();
    tracker.wait().await;

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("After failure"));
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_the_wait_fires_nothing() {
    let registry = PendingRegistry::new();
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    let event = event_in(3600, "Cancelled");
    registry.insert(event.key());

    let sink = Arc::new(RecordingSink::new());
    let sink_dyn: Arc<dyn ReminderSink> = sink.clone();

    tracker.spawn(schedule_reminder(
        event,
        DEFAULT_MESSAGE_TEMPLATE.to_string(),
        registry.clone(),
        sink_dyn,
        token.clone(),
    ));

    token.cancel();
    tracker.close();
    tracker.wait().await;

    assert!(sink.sent().is_empty());
    assert_eq!(registry.len(), 1);
}
