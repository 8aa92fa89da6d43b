use super::models::CalendarEvent;
use super::parse;
use crate::config::Config;
use crate::error::{caldav_error, BotResult};
use reqwest::{Client, Method};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use url::Url;

const PRINCIPAL_BODY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<d:propfind xmlns:d="DAV:">
  <d:prop><d:current-user-principal/></d:prop>
</d:propfind>"#;

const HOME_SET_BODY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop><c:calendar-home-set/></d:prop>
</d:propfind>"#;

const LISTING_BODY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<d:propfind xmlns:d="DAV:">
  <d:prop><d:resourcetype/><d:displayname/></d:prop>
</d:propfind>"#;

// The original script fetches the whole calendar, so no time-range filter here
const EVENTS_BODY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop><d:getetag/><c:calendar-data/></d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT"/>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#;

/// The CalDAV actor that processes messages
pub struct CalDavActor {
    config: Arc<RwLock<Config>>,
    client: Client,
    command_rx: mpsc::Receiver<CalDavCommand>,
}

/// Commands that can be sent to the CalDAV actor
pub enum CalDavCommand {
    FetchEvents(mpsc::Sender<BotResult<Vec<CalendarEvent>>>),
    Shutdown,
}

/// Handle for communicating with the CalDAV actor
#[derive(Clone)]
pub struct CalDavActorHandle {
    command_tx: mpsc::Sender<CalDavCommand>,
}

impl CalDavActorHandle {
    /// Fetch the current events of the watched calendar
    pub async fn fetch_events(&self) -> BotResult<Vec<CalendarEvent>> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(CalDavCommand::FetchEvents(response_tx))
            .await
            .map_err(|e| caldav_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| caldav_error("Response channel closed"))?
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> BotResult<()> {
        let _ = self.command_tx.send(CalDavCommand::Shutdown).await;
        Ok(())
    }
}

impl CalDavActor {
    /// Create a new actor and return its handle
    pub fn new(config: Arc<RwLock<Config>>) -> (Self, CalDavActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            config,
            client: Client::new(),
            command_rx,
        };

        let handle = CalDavActorHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("CalDAV actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                CalDavCommand::FetchEvents(response_tx) => {
                    let result =
                        Self::fetch_events(Arc::clone(&self.config), self.client.clone()).await;
                    let _ = response_tx.send(result).await;
                }
                CalDavCommand::Shutdown => {
                    info!("CalDAV actor shutting down");
                    break;
                }
            }
        }

        info!("CalDAV actor shut down");
    }

    /// Fetch and normalize the events of the configured calendar.
    ///
    /// Follows the usual CalDAV discovery chain: current-user-principal,
    /// calendar-home-set, then a Depth 1 listing of the home to find the
    /// calendar collections.
    async fn fetch_events(
        config: Arc<RwLock<Config>>,
        client: Client,
    ) -> BotResult<Vec<CalendarEvent>> {
        let (base_url, username, password, calendar_name) = {
            let config_read = config.read().await;
            (
                config_read.caldav_url.clone(),
                config_read.caldav_username.clone(),
                config_read.caldav_password.clone(),
                config_read.caldav_calendar_name.clone(),
            )
        };

        let base = Url::parse(&base_url)
            .map_err(|e| caldav_error(&format!("Invalid CalDAV URL: {}", e)))?;

        info!("Connecting to CalDAV server...");

        let request = DavRequest {
            client: &client,
            username: &username,
            password: &password,
        };

        let principal_xml = request.propfind(&base, "0", PRINCIPAL_BODY).await?;
        let principal = join_href(&base, &parse::principal_href(&principal_xml)?)?;

        let home_xml = request.propfind(&principal, "0", HOME_SET_BODY).await?;
        let home = join_href(&base, &parse::calendar_home_href(&home_xml)?)?;

        let listing_xml = request.propfind(&home, "1", LISTING_BODY).await?;
        let calendars = parse::parse_calendar_listing(&listing_xml)?;

        let calendar = match parse::select_calendar(&calendars, &calendar_name) {
            Some(calendar) => calendar,
            None => {
                warn!("No calendars found.");
                return Ok(Vec::new());
            }
        };

        info!("Using calendar: {}", calendar.display_name);

        let calendar_url = join_href(&base, &calendar.href)?;
        let report_xml = request.report(&calendar_url, EVENTS_BODY).await?;
        let events = parse::parse_event_report(&report_xml)?;

        info!("Fetched {} events from the calendar.", events.len());
        Ok(events)
    }
}

/// Shared request plumbing for the WebDAV methods reqwest has no shorthand for
struct DavRequest<'a> {
    client: &'a Client,
    username: &'a str,
    password: &'a str,
}

impl DavRequest<'_> {
    async fn propfind(&self, url: &Url, depth: &str, body: &str) -> BotResult<String> {
        self.send("PROPFIND", url, depth, body).await
    }

    async fn report(&self, url: &Url, body: &str) -> BotResult<String> {
        self.send("REPORT", url, "1", body).await
    }

    async fn send(&self, method: &str, url: &Url, depth: &str, body: &str) -> BotResult<String> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| caldav_error(&format!("Invalid method: {}", e)))?;

        let response = self
            .client
            .request(method, url.clone())
            .basic_auth(self.username, Some(self.password))
            .header("Depth", depth)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| caldav_error(&format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(caldav_error(&format!(
                "Server returned HTTP {} for {}: {}",
                status, url, error_body
            )));
        }

        Ok(response.text().await?)
    }
}

fn join_href(base: &Url, href: &str) -> BotResult<Url> {
    base.join(href)
        .map_err(|e| caldav_error(&format!("Invalid href '{}': {}", href, e)))
}
