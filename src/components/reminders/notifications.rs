use super::ReminderSink;
use crate::components::caldav::CalendarEvent;
use tracing::error;

/// Render the reminder text for one event from the configured template
pub fn render_reminder(template: &str, event: &CalendarEvent) -> String {
    template
        .replace("{summary}", &event.summary)
        .replace("{description}", &event.description)
        .replace("{location}", &event.location)
}

/// Deliver a reminder for one event, best effort.
///
/// A delivery failure is logged and swallowed here so it can never take down
/// the scheduler task that invoked it. A missed reminder is preferable to
/// crashing the whole process.
pub async fn send_reminder(sink: &dyn ReminderSink, template: &str, event: &CalendarEvent) {
    let message = render_reminder(template, event);
    if let Err(e) = sink.deliver(message).await {
        error!("Failed to deliver reminder for '{}': {:?}", event.summary, e);
    }
}
