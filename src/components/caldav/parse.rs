use super::models::CalendarEvent;
use super::time::parse_dtstart;
use crate::error::{caldav_error, BotResult};
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use roxmltree::{Document, Node};
use tracing::warn;

/// Marker glyph prepended to a non-empty location before display
pub const LOCATION_MARKER: &str = "\u{1f4cd} ";

/// One calendar collection found on the server
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    pub href: String,
    pub display_name: String,
}

/// Pick the calendar to watch: an exact display-name match when a selector is
/// configured, otherwise the first calendar in the listing.
pub fn select_calendar<'a>(calendars: &'a [Calendar], name: &str) -> Option<&'a Calendar> {
    if !name.is_empty() {
        if let Some(calendar) = calendars.iter().find(|c| c.display_name == name) {
            return Some(calendar);
        }
    }
    calendars.first()
}

/// Extract the current-user-principal href from a PROPFIND response
pub fn principal_href(xml: &str) -> BotResult<String> {
    let doc = parse_document(xml)?;
    find_element(doc.root_element(), "current-user-principal")
        .and_then(|node| element_text(node, "href"))
        .ok_or_else(|| caldav_error("No current-user-principal in response"))
}

/// Extract the calendar-home-set href from a PROPFIND response
pub fn calendar_home_href(xml: &str) -> BotResult<String> {
    let doc = parse_document(xml)?;
    find_element(doc.root_element(), "calendar-home-set")
        .and_then(|node| element_text(node, "href"))
        .ok_or_else(|| caldav_error("No calendar-home-set in response"))
}

/// List the calendar collections in a PROPFIND Depth 1 response on the
/// calendar home. Non-calendar resources are skipped.
pub fn parse_calendar_listing(xml: &str) -> BotResult<Vec<Calendar>> {
    let doc = parse_document(xml)?;
    let mut calendars = Vec::new();

    for response in elements_named(doc.root_element(), "response") {
        let Some(href) = element_text(response, "href") else {
            continue;
        };

        let is_calendar = find_element(response, "resourcetype")
            .map(|rt| find_element(rt, "calendar").is_some())
            .unwrap_or(false);
        if !is_calendar {
            continue;
        }

        let display_name = element_text(response, "displayname").unwrap_or_default();
        calendars.push(Calendar {
            href,
            display_name,
        });
    }

    Ok(calendars)
}

/// Parse the events out of a REPORT calendar-query response
pub fn parse_event_report(xml: &str) -> BotResult<Vec<CalendarEvent>> {
    let doc = parse_document(xml)?;
    let mut events = Vec::new();

    for node in elements_named(doc.root_element(), "calendar-data") {
        if let Some(data) = node.text() {
            events.extend(parse_ics(data)?);
        }
    }

    Ok(events)
}

/// Parse iCalendar data into normalized event records
pub fn parse_ics(data: &str) -> BotResult<Vec<CalendarEvent>> {
    let reader = std::io::BufReader::new(data.as_bytes());
    let mut events = Vec::new();

    for calendar in ical::IcalParser::new(reader) {
        let calendar = calendar
            .map_err(|e| caldav_error(&format!("Failed to parse iCalendar data: {}", e)))?;
        for vevent in &calendar.events {
            if let Some(event) = normalize_vevent(vevent) {
                events.push(event);
            }
        }
    }

    Ok(events)
}

/// Normalize one VEVENT. Entries without a summary or without a parseable
/// start time are skipped with a warning.
fn normalize_vevent(vevent: &IcalEvent) -> Option<CalendarEvent> {
    let summary = match property_value(vevent, "SUMMARY") {
        Some(summary) if !summary.is_empty() => summary,
        _ => {
            warn!("Skipping event without a summary");
            return None;
        }
    };

    let dtstart = match find_property(vevent, "DTSTART") {
        Some(prop) => prop,
        None => {
            warn!("Skipping event '{}' without a start time", summary);
            return None;
        }
    };

    let value = dtstart.value.as_deref().unwrap_or_default();
    let tzid = property_param(dtstart, "TZID");
    let start = match parse_dtstart(value, tzid.as_deref()) {
        Ok(start) => start,
        Err(e) => {
            warn!("Skipping event '{}' with bad start time: {:?}", summary, e);
            return None;
        }
    };

    let description = property_value(vevent, "DESCRIPTION").unwrap_or_default();
    let location = match property_value(vevent, "LOCATION") {
        Some(location) if !location.is_empty() => format!("{}{}", LOCATION_MARKER, location),
        _ => String::new(),
    };

    Some(CalendarEvent {
        summary,
        description,
        location,
        start,
    })
}

fn find_property<'a>(event: &'a IcalEvent, name: &str) -> Option<&'a Property> {
    event
        .properties
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

fn property_value(event: &IcalEvent, name: &str) -> Option<String> {
    find_property(event, name).and_then(|p| p.value.clone())
}

fn property_param(property: &Property, name: &str) -> Option<String> {
    property.params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first().cloned())
    })
}

fn parse_document(xml: &str) -> BotResult<Document<'_>> {
    Document::parse(xml).map_err(|e| caldav_error(&format!("Failed to parse response XML: {}", e)))
}

// WebDAV servers differ in namespace prefixes, so elements are matched by
// local name only.
fn elements_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn find_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn element_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    find_element(node, name)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
