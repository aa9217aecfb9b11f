use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use futures::future::join_all;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::calendar::CalendarProvider;
use crate::models::interval::{BusyInterval, Interval};
use crate::services::schedule_utils::parse_datetime;
use crate::services::settings_service::CalendarSettings;

const PRIMARY_CALENDAR: &str = "primary";
const TOKEN_EXTENSION: &str = "token";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const MAX_RESULTS: &str = "2500";

/// Authorized-user credentials stored per attendee as `<local-part>.token`.
#[derive(Debug, Clone, Deserialize)]
struct AuthorizedUser {
    #[serde(default, alias = "access_token")]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

impl AuthorizedUser {
    fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    summary: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    #[serde(default)]
    attendees: Vec<EventAttendee>,
}

#[derive(Debug, Deserialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTime {
    fn instant(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.date_time.as_deref().or(self.date.as_deref())?;
        parse_datetime(raw).ok()
    }
}

#[derive(Debug, Deserialize)]
struct EventAttendee {
    email: Option<String>,
}

enum ListOutcome {
    Events(Vec<GoogleEvent>),
    Unauthorized,
}

/// Reads each attendee's primary Google calendar with their stored credentials.
pub struct GoogleCalendarProvider {
    client: reqwest::Client,
    keys_dir: PathBuf,
    api_base: String,
}

impl GoogleCalendarProvider {
    pub fn try_new(settings: &CalendarSettings) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .map_err(|err| AppError::other(format!("failed to build calendar HTTP client: {err}")))?;
        Ok(Self {
            client,
            keys_dir: settings.keys_dir.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Fallible variant of `fetch_busy`, kept separate so callers can see why a fetch failed.
    pub async fn try_fetch_busy(
        &self,
        attendee: &str,
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<BusyInterval>> {
        let credentials = self.load_credentials(attendee)?;
        let mut access_token = match credentials.token.clone() {
            Some(token) => token,
            None => self.refresh_access_token(attendee, &credentials).await?,
        };

        let mut refreshed = false;
        let events = loop {
            match self
                .list_events(attendee, &access_token, window_start, window_end)
                .await?
            {
                ListOutcome::Events(events) => break events,
                ListOutcome::Unauthorized if !refreshed && credentials.can_refresh() => {
                    debug!(target: "app::calendar", %attendee, "access token rejected; refreshing");
                    access_token = self.refresh_access_token(attendee, &credentials).await?;
                    refreshed = true;
                }
                ListOutcome::Unauthorized => {
                    return Err(AppError::calendar(attendee, "calendar API rejected credentials"));
                }
            }
        };

        let busy: Vec<BusyInterval> = events.iter().filter_map(to_busy_interval).collect();
        info!(
            target: "app::calendar",
            %attendee,
            events = events.len(),
            usable = busy.len(),
            "fetched calendar events"
        );
        Ok(busy)
    }

    fn token_path(&self, attendee: &str) -> AppResult<PathBuf> {
        let local_part = attendee.trim().split('@').next().unwrap_or_default();
        let valid = !local_part.is_empty()
            && local_part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
            && !local_part.starts_with('.');
        if !valid {
            return Err(AppError::calendar(attendee, "attendee address has no usable local part"));
        }
        Ok(self
            .keys_dir
            .join(format!("{local_part}.{TOKEN_EXTENSION}")))
    }

    fn load_credentials(&self, attendee: &str) -> AppResult<AuthorizedUser> {
        let path = self.token_path(attendee)?;
        let raw = std::fs::read_to_string(&path).map_err(|err| {
            AppError::calendar(attendee, format!("cannot read {}: {err}", path.display()))
        })?;
        let credentials: AuthorizedUser = serde_json::from_str(&raw).map_err(|err| {
            AppError::calendar(attendee, format!("invalid token file {}: {err}", path.display()))
        })?;
        if credentials.token.is_none() && !credentials.can_refresh() {
            return Err(AppError::calendar(attendee, "token file holds no usable credentials"));
        }
        Ok(credentials)
    }

    async fn refresh_access_token(
        &self,
        attendee: &str,
        credentials: &AuthorizedUser,
    ) -> AppResult<String> {
        let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            credentials.refresh_token.as_deref(),
            credentials.client_id.as_deref(),
            credentials.client_secret.as_deref(),
        ) else {
            return Err(AppError::calendar(attendee, "no refresh credentials available"));
        };
        let token_uri = credentials.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);

        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|err| AppError::calendar(attendee, format!("token refresh failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::calendar(
                attendee,
                format!("token refresh returned status {}", status.as_u16()),
            ));
        }

        let parsed: RefreshResponse = response.json().await.map_err(|err| {
            AppError::calendar(attendee, format!("invalid token refresh payload: {err}"))
        })?;
        Ok(parsed.access_token)
    }

    async fn list_events(
        &self,
        attendee: &str,
        access_token: &str,
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> AppResult<ListOutcome> {
        let endpoint = format!("{}/calendars/{PRIMARY_CALENDAR}/events", self.api_base);
        let time_min = window_start.to_rfc3339_opts(SecondsFormat::Secs, false);
        let time_max = window_end.to_rfc3339_opts(SecondsFormat::Secs, false);
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut req = self
                .client
                .get(&endpoint)
                .bearer_auth(access_token)
                .query(&[
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", MAX_RESULTS),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                req = req.query(&[("pageToken", page_token)]);
            }

            let response = req.send().await.map_err(|err| {
                AppError::calendar(attendee, format!("network error while listing events: {err}"))
            })?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                return Ok(ListOutcome::Unauthorized);
            }
            if !status.is_success() {
                return Err(AppError::calendar(
                    attendee,
                    format!("events list returned status {}", status.as_u16()),
                ));
            }

            let page: EventsPage = response.json().await.map_err(|err| {
                AppError::calendar(attendee, format!("invalid events list payload: {err}"))
            })?;
            events.extend(page.items);

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(ListOutcome::Events(events))
    }
}

fn to_busy_interval(event: &GoogleEvent) -> Option<BusyInterval> {
    let start = event.start.as_ref()?.instant()?;
    let end = event.end.as_ref()?.instant()?;
    let interval = Interval::new(start, end).ok()?;

    let mut attendees: Vec<String> = Vec::new();
    for email in event.attendees.iter().filter_map(|a| a.email.as_deref()) {
        if !attendees.iter().any(|known| known == email) {
            attendees.push(email.to_string());
        }
    }

    Some(BusyInterval {
        interval,
        attendees,
        summary: event.summary.clone(),
    })
}

#[async_trait::async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn fetch_busy(
        &self,
        attendee: &str,
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> Vec<BusyInterval> {
        match self.try_fetch_busy(attendee, window_start, window_end).await {
            Ok(busy) => busy,
            Err(err) => {
                warn!(target: "app::calendar", %attendee, error = %err, "no calendar data; treating attendee as free");
                Vec::new()
            }
        }
    }
}

/// Fixed busy periods per attendee, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCalendarProvider {
    busy: HashMap<String, Vec<BusyInterval>>,
}

impl InMemoryCalendarProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy(mut self, attendee: impl Into<String>, busy: Vec<BusyInterval>) -> Self {
        self.busy.entry(attendee.into()).or_default().extend(busy);
        self
    }
}

#[async_trait::async_trait]
impl CalendarProvider for InMemoryCalendarProvider {
    async fn fetch_busy(
        &self,
        attendee: &str,
        window_start: DateTime<FixedOffset>,
        window_end: DateTime<FixedOffset>,
    ) -> Vec<BusyInterval> {
        let window = Interval {
            start: window_start,
            end: window_end,
        };
        self.busy
            .get(attendee)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.interval.overlaps(&window))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One attendee's busy periods as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendeeBusy {
    pub email: String,
    pub busy: Vec<BusyInterval>,
}

/// Fetches every attendee concurrently; a fetch that outlives `timeout` counts as empty.
pub async fn fetch_all(
    provider: &dyn CalendarProvider,
    attendees: &[String],
    window_start: DateTime<FixedOffset>,
    window_end: DateTime<FixedOffset>,
    timeout: StdDuration,
) -> Vec<AttendeeBusy> {
    let fetches = attendees.iter().map(|email| async move {
        let busy = match tokio::time::timeout(
            timeout,
            provider.fetch_busy(email, window_start, window_end),
        )
        .await
        {
            Ok(busy) => busy,
            Err(_) => {
                warn!(
                    target: "app::calendar",
                    attendee = %email,
                    timeout_ms = timeout.as_millis() as u64,
                    "calendar fetch timed out; treating attendee as free"
                );
                Vec::new()
            }
        };
        AttendeeBusy {
            email: email.clone(),
            busy,
        }
    });
    join_all(fetches).await
}
