use chrono::{DateTime, Utc};

/// One calendar entry as observed at fetch time
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    /// Free text, empty when the entry has none
    pub description: String,
    /// Free text, already decorated with the location marker when present
    pub location: String,
    /// Start instant, always timezone-aware UTC
    pub start: DateTime<Utc>,
}

impl CalendarEvent {
    /// Deduplication identity of this event
    pub fn key(&self) -> EventKey {
        EventKey {
            summary: self.summary.clone(),
            start: self.start,
        }
    }
}

/// Identity tuple used for deduplication: two fetched records with the same
/// summary and start instant are the same logical event even if their
/// description or location differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub summary: String,
    pub start: DateTime<Utc>,
}
