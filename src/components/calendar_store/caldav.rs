//! CalDAV backend over plain HTTP.
//!
//! Speaks just enough WebDAV to discover calendars (PROPFIND), create them
//! (MKCALENDAR), read events (REPORT calendar-query), write new events
//! (PUT) and remove them (DELETE).

use super::backend::CalendarBackend;
use super::models::{Calendar, RawEvent};
use crate::error::{config_error, store_error, BotResult};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use tracing::debug;
use url::Url;
use uuid::Uuid;

const PROPFIND_CALENDARS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#;

/// Headers for writing a new event; If-None-Match makes the server refuse
/// to overwrite an existing object
const PUT_HEADERS: [(&str, &str); 2] = [
    ("Content-Type", "text/calendar; charset=utf-8"),
    ("If-None-Match", "*"),
];

const REPORT_EVENTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data/>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT"/>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#;

/// Calendar backend talking to a CalDAV calendar home
#[derive(Debug, Clone)]
pub struct CalDavBackend {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

/// One `<response>` element of a multistatus body
#[derive(Debug, Default, PartialEq, Eq)]
struct DavResponse {
    href: String,
    display_name: Option<String>,
    is_calendar: bool,
    calendar_data: Option<String>,
}

impl CalDavBackend {
    /// Create a backend for the calendar home at `url`
    pub fn new(url: &str, username: &str, password: &str) -> BotResult<Self> {
        let mut base_url =
            Url::parse(url).map_err(|e| config_error(&format!("Invalid CALDAV_URL: {}", e)))?;

        // Relative hrefs resolve against the collection, not its parent
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn resolve(&self, href: &str) -> BotResult<Url> {
        self.base_url
            .join(href)
            .map_err(|e| store_error(&format!("Invalid href '{}': {}", href, e)))
    }

    async fn send(
        &self,
        method: &str,
        url: Url,
        headers: &[(&str, &str)],
        body: Option<String>,
    ) -> BotResult<(StatusCode, String)> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| store_error(&format!("Invalid method {}: {}", method, e)))?;

        debug!("CalDAV {} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .basic_auth(&self.username, Some(&self.password));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| store_error(&format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            store_error(&format!("Could not read {} response body: {}", method, e))
        })?;

        Ok((status, text))
    }
}

#[async_trait]
impl CalendarBackend for CalDavBackend {
    async fn list_calendars(&self) -> BotResult<Vec<Calendar>> {
        let (status, body) = self
            .send(
                "PROPFIND",
                self.base_url.clone(),
                &[("Depth", "1"), ("Content-Type", "application/xml; charset=utf-8")],
                Some(PROPFIND_CALENDARS.to_string()),
            )
            .await?;

        if !status.is_success() {
            return Err(store_error(&format!(
                "Failed to list calendars: HTTP {} - {}",
                status, body
            )));
        }

        let calendars = parse_multistatus(&body)?
            .into_iter()
            .filter(|r| r.is_calendar)
            .map(|r| {
                let name = r
                    .display_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| last_segment(&r.href));
                Calendar { name, href: r.href }
            })
            .collect();

        Ok(calendars)
    }

    async fn create_calendar(&self, name: &str) -> BotResult<Calendar> {
        let taken: Vec<String> = self
            .list_calendars()
            .await?
            .into_iter()
            .map(|c| c.href)
            .collect();
        let url = collection_url(&self.base_url, name, &taken)?;
        let body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<c:mkcalendar xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:set>
    <d:prop>
      <d:displayname>{}</d:displayname>
      <c:supported-calendar-component-set>
        <c:comp name="VEVENT"/>
      </c:supported-calendar-component-set>
    </d:prop>
  </d:set>
</c:mkcalendar>"#,
            escape_xml(name)
        );

        let (status, text) = self
            .send(
                "MKCALENDAR",
                url.clone(),
                &[("Content-Type", "application/xml; charset=utf-8")],
                Some(body),
            )
            .await?;

        if !status.is_success() {
            return Err(store_error(&format!(
                "Failed to create calendar '{}': HTTP {} - {}",
                name, status, text
            )));
        }

        Ok(Calendar {
            name: name.to_string(),
            href: url.path().to_string(),
        })
    }

    async fn list_events(&self, calendar: &Calendar) -> BotResult<Vec<RawEvent>> {
        let (status, body) = self
            .send(
                "REPORT",
                self.resolve(&calendar.href)?,
                &[("Depth", "1"), ("Content-Type", "application/xml; charset=utf-8")],
                Some(REPORT_EVENTS.to_string()),
            )
            .await?;

        if !status.is_success() {
            return Err(store_error(&format!(
                "Failed to list events in '{}': HTTP {} - {}",
                calendar.name, status, body
            )));
        }

        Ok(parse_multistatus(&body)?
            .into_iter()
            .filter_map(|r| {
                r.calendar_data.map(|data| RawEvent {
                    href: r.href,
                    data,
                })
            })
            .collect())
    }

    fn event_href(&self, calendar: &Calendar, uid: &str) -> BotResult<String> {
        let url = event_url(&self.resolve(&calendar.href)?, uid)?;
        Ok(url.path().to_string())
    }

    async fn put_event(&self, calendar: &Calendar, href: &str, ics: &str) -> BotResult<()> {
        let (status, text) = self
            .send("PUT", self.resolve(href)?, &PUT_HEADERS, Some(ics.to_string()))
            .await?;

        if !status.is_success() {
            return Err(store_error(&format!(
                "Failed to save event at {} in '{}': HTTP {} - {}",
                href, calendar.name, status, text
            )));
        }

        Ok(())
    }

    async fn delete_event(&self, href: &str) -> BotResult<()> {
        let (status, text) = self.send("DELETE", self.resolve(href)?, &[], None).await?;

        // Already gone counts as deleted
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(store_error(&format!(
                "Failed to delete event at {}: HTTP {} - {}",
                href, status, text
            )));
        }

        Ok(())
    }
}

/// Parse a WebDAV multistatus body
fn parse_multistatus(body: &str) -> BotResult<Vec<DavResponse>> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| store_error(&format!("Invalid multistatus response: {}", e)))?;

    let responses = doc
        .root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
        .filter_map(|response| {
            let find = |name: &str| {
                response
                    .descendants()
                    .find(|n| n.tag_name().name() == name)
            };

            let href = find("href")?.text()?.trim().to_string();
            let display_name = find("displayname")
                .and_then(|n| n.text())
                .map(|s| s.trim().to_string());
            let is_calendar = find("resourcetype")
                .map(|n| n.children().any(|c| c.tag_name().name() == "calendar"))
                .unwrap_or(false);
            let calendar_data = find("calendar-data")
                .and_then(|n| n.text())
                .map(|s| s.to_string());

            Some(DavResponse {
                href,
                display_name,
                is_calendar,
                calendar_data,
            })
        })
        .collect();

    Ok(responses)
}

fn last_segment(href: &str) -> String {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(href)
        .to_string()
}

/// Object URL for `uid` inside `collection`.
///
/// The uid is pushed as a single percent-encoded segment, so `/`, `?` and
/// `#` stay part of the name.
fn event_url(collection: &Url, uid: &str) -> BotResult<Url> {
    let mut url = collection.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| store_error(&format!("Calendar URL {} cannot hold events", collection)))?
        .pop_if_empty()
        .push(&format!("{}.ics", uid));
    Ok(url)
}

/// URL for a new calendar collection under `base`.
///
/// Uses the slug of `name`, or a random segment when the slug is empty or
/// its path is already one of the `taken` collection hrefs.
fn collection_url(base: &Url, name: &str, taken: &[String]) -> BotResult<Url> {
    let slug = slugify(name);
    if !slug.is_empty() {
        let url = child_collection(base, &slug)?;
        let path = url.path().trim_end_matches('/');
        if !taken
            .iter()
            .any(|t| t.trim_end_matches('/').eq_ignore_ascii_case(path))
        {
            return Ok(url);
        }
    }
    child_collection(base, &Uuid::new_v4().to_string())
}

fn child_collection(base: &Url, segment: &str) -> BotResult<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| store_error(&format!("Calendar home {} cannot hold calendars", base)))?
        .pop_if_empty()
        .push(segment)
        .push("");
    Ok(url)
}

fn slugify(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    slug.trim_matches('-').to_string()
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
