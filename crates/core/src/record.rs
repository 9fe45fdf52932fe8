//! Record model: wire payloads, validation, and the persisted event shapes.
//!
//! Each entity stream has a wire payload (what a client library sends) and a
//! validated event (what the pipeline batches and the database stores):
//!
//! | Stream   | Wire payload       | Validated event  | Table      |
//! |----------|--------------------|------------------|------------|
//! | requests | [`RequestPayload`] | [`RequestEvent`] | `requests` |
//! | monitors | [`MonitorPayload`] | [`MonitorEvent`] | `monitor`  |
//! | pings    | [`PingPayload`]    | [`PingEvent`]    | `pings`    |
//!
//! Validation never touches the database. Whether an `api_key` belongs to an
//! existing account is decided at persistence time.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;

use crate::error::CoreError;
use crate::types::{ApiKey, Timestamp};

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Width of every `VARCHAR` column that stores client-supplied text.
pub const MAX_FIELD_LEN: usize = 255;

/// Maximum number of request events accepted in one batched payload.
pub const MAX_EVENTS_PER_PAYLOAD: usize = 1000;

/* --------------------------------------------------------------------------
HTTP method table
-------------------------------------------------------------------------- */

/// HTTP method of an observed request.
///
/// The discriminant is the code stored in `requests.method`. The table is
/// closed: a method outside it is a validation error, never a default code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum HttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
    Options = 5,
    Connect = 6,
    Head = 7,
    Trace = 8,
}

impl HttpMethod {
    /// Every method, in code order.
    pub const ALL: [HttpMethod; 9] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Connect,
        HttpMethod::Head,
        HttpMethod::Trace,
    ];

    /// The stored small-integer code.
    pub fn code(self) -> i16 {
        self as i16
    }

    /// The uppercase wire name.
    pub fn name(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Head => "HEAD",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Resolve a stored code back to a method.
    pub fn from_code(code: i64) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|m| i64::from(m.code()) == code)
            .ok_or_else(|| CoreError::Validation(format!("Unknown HTTP method code: {code}")))
    }
}

impl FromStr for HttpMethod {
    type Err = CoreError;

    /// Names are matched exactly as sent on the wire (uppercase).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown HTTP method: '{s}'. Valid methods: {}",
                    Self::ALL.map(HttpMethod::name).join(", ")
                ))
            })
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/* --------------------------------------------------------------------------
Wire scalars
-------------------------------------------------------------------------- */

/// The `method` field as sent by client libraries: the uppercase name, or
/// (older clients) the numeric code.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireMethod {
    Code(i64),
    Name(String),
}

impl WireMethod {
    pub fn resolve(&self) -> Result<HttpMethod, CoreError> {
        match self {
            WireMethod::Code(code) => HttpMethod::from_code(*code),
            WireMethod::Name(name) => name.parse(),
        }
    }
}

/// An integer field that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireInt {
    Int(i64),
    Text(String),
}

impl WireInt {
    /// Parse as a non-negative integer that fits `T`.
    pub fn non_negative<T>(&self, field: &'static str) -> Result<T, CoreError>
    where
        T: TryFrom<i64>,
    {
        let value = match self {
            WireInt::Int(v) => *v,
            WireInt::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                CoreError::Validation(format!("{field} must be an integer, got '{s}'"))
            })?,
        };
        if value < 0 {
            return Err(CoreError::Validation(format!(
                "{field} must be non-negative, got {value}"
            )));
        }
        T::try_from(value)
            .map_err(|_| CoreError::Validation(format!("{field} is out of range: {value}")))
    }
}

impl From<i64> for WireInt {
    fn from(v: i64) -> Self {
        WireInt::Int(v)
    }
}

/* --------------------------------------------------------------------------
Field helpers
-------------------------------------------------------------------------- */

/// Validate and parse a tenant API key.
pub fn parse_api_key(raw: &str) -> Result<ApiKey, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("api_key is required".to_string()));
    }
    ApiKey::parse_str(trimmed)
        .map_err(|_| CoreError::Validation(format!("api_key is not a valid key: '{trimmed}'")))
}

/// Truncate to at most [`MAX_FIELD_LEN`] characters, on a char boundary.
pub fn truncate_field(mut value: String) -> String {
    if let Some((idx, _)) = value.char_indices().nth(MAX_FIELD_LEN) {
        value.truncate(idx);
    }
    value
}

fn truncate_opt(value: Option<String>) -> Option<String> {
    value.map(truncate_field)
}

fn required_url(url: String) -> Result<String, CoreError> {
    if url.trim().is_empty() {
        return Err(CoreError::Validation("url is required".to_string()));
    }
    Ok(truncate_field(url))
}

fn event_time(created_at: Option<DateTime<FixedOffset>>, received_at: Timestamp) -> Timestamp {
    created_at
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(received_at)
}

/* --------------------------------------------------------------------------
Requests
-------------------------------------------------------------------------- */

/// Per-request fields shared by the single and batched request payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestItem {
    #[serde(default)]
    pub hostname: Option<String>,
    pub path: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub method: WireMethod,
    pub response_time: WireInt,
    pub status: WireInt,
    /// Event time as recorded by the client. Defaults to the intake time.
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
}

/// `POST /api/log-request` body: one observed request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPayload {
    pub api_key: String,
    pub framework: WireInt,
    #[serde(flatten)]
    pub item: RequestItem,
}

/// `POST /api/log-requests` body: many requests from one client library.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestBatchPayload {
    pub api_key: String,
    pub framework: WireInt,
    pub requests: Vec<RequestItem>,
}

/// A validated request event, ready to be batched and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEvent {
    pub api_key: ApiKey,
    pub hostname: Option<String>,
    pub path: String,
    pub user_agent: Option<String>,
    pub method: HttpMethod,
    pub response_time: i32,
    pub status: i16,
    pub framework: i16,
    pub ip_address: Option<IpAddr>,
    pub location: Option<String>,
    pub created_at: Timestamp,
}

impl RequestEvent {
    /// Attach the client address observed at the intake boundary and the
    /// location derived from it.
    pub fn with_origin(mut self, ip_address: Option<IpAddr>, location: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.location = truncate_opt(location);
        self
    }
}

impl RequestItem {
    fn validate(
        self,
        api_key: ApiKey,
        framework: i16,
        received_at: Timestamp,
    ) -> Result<RequestEvent, CoreError> {
        let method = self.method.resolve()?;
        let response_time = self.response_time.non_negative::<i32>("response_time")?;
        let status = self.status.non_negative::<i16>("status")?;

        Ok(RequestEvent {
            api_key,
            hostname: truncate_opt(self.hostname),
            path: truncate_field(self.path),
            user_agent: truncate_opt(self.user_agent),
            method,
            response_time,
            status,
            framework,
            ip_address: None,
            location: None,
            created_at: event_time(self.created_at, received_at),
        })
    }
}

impl RequestPayload {
    pub fn validate(self, received_at: Timestamp) -> Result<RequestEvent, CoreError> {
        let api_key = parse_api_key(&self.api_key)?;
        let framework = self.framework.non_negative::<i16>("framework")?;
        self.item.validate(api_key, framework, received_at)
    }
}

impl RequestBatchPayload {
    /// Validate every element. One invalid element rejects the whole payload,
    /// so a batched submission is never partially accepted.
    pub fn validate(self, received_at: Timestamp) -> Result<Vec<RequestEvent>, CoreError> {
        if self.requests.len() > MAX_EVENTS_PER_PAYLOAD {
            return Err(CoreError::Validation(format!(
                "At most {MAX_EVENTS_PER_PAYLOAD} requests per payload, got {}",
                self.requests.len()
            )));
        }
        let api_key = parse_api_key(&self.api_key)?;
        let framework = self.framework.non_negative::<i16>("framework")?;

        self.requests
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                item.validate(api_key, framework, received_at)
                    .map_err(|e| match e {
                        CoreError::Validation(msg) => {
                            CoreError::Validation(format!("requests[{i}]: {msg}"))
                        }
                        other => other,
                    })
            })
            .collect()
    }
}

/* --------------------------------------------------------------------------
Monitors
-------------------------------------------------------------------------- */

/// `POST /api/monitor` body: register a URL to be monitored.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorPayload {
    pub api_key: String,
    pub url: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub ping: bool,
}

/// A validated monitor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorEvent {
    pub api_key: ApiKey,
    pub url: String,
    pub secure: bool,
    pub ping: bool,
    pub created_at: Timestamp,
}

impl MonitorPayload {
    pub fn validate(self, received_at: Timestamp) -> Result<MonitorEvent, CoreError> {
        Ok(MonitorEvent {
            api_key: parse_api_key(&self.api_key)?,
            url: required_url(self.url)?,
            secure: self.secure,
            ping: self.ping,
            created_at: received_at,
        })
    }
}

/* --------------------------------------------------------------------------
Pings
-------------------------------------------------------------------------- */

/// `POST /api/ping` body: one uptime check result from the monitoring service.
#[derive(Debug, Clone, Deserialize)]
pub struct PingPayload {
    pub api_key: String,
    pub url: String,
    pub response_time: WireInt,
    pub status: WireInt,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
}

/// A validated ping result.
#[derive(Debug, Clone, PartialEq)]
pub struct PingEvent {
    pub api_key: ApiKey,
    pub url: String,
    pub response_time: i32,
    pub status: i16,
    pub created_at: Timestamp,
}

impl PingPayload {
    pub fn validate(self, received_at: Timestamp) -> Result<PingEvent, CoreError> {
        Ok(PingEvent {
            api_key: parse_api_key(&self.api_key)?,
            url: required_url(self.url)?,
            response_time: self.response_time.non_negative::<i32>("response_time")?,
            status: self.status.non_negative::<i16>("status")?,
            created_at: event_time(self.created_at, received_at),
        })
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    const KEY: &str = "6f1c9a4e-2b7d-4c1e-9a53-0d8e7f2b1c34";

    fn received_at() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn request_json(method: serde_json::Value) -> serde_json::Value {
        json!({
            "api_key": KEY,
            "path": "/users",
            "method": method,
            "status": 200,
            "response_time": 42,
            "framework": 1,
        })
    }

    fn parse_request(body: serde_json::Value) -> Result<RequestEvent, CoreError> {
        serde_json::from_value::<RequestPayload>(body)
            .unwrap()
            .validate(received_at())
    }

    // -- HttpMethod --

    #[test]
    fn method_codes_match_fixed_table() {
        let expected = [
            ("GET", 0),
            ("POST", 1),
            ("PUT", 2),
            ("PATCH", 3),
            ("DELETE", 4),
            ("OPTIONS", 5),
            ("CONNECT", 6),
            ("HEAD", 7),
            ("TRACE", 8),
        ];
        for (name, code) in expected {
            let method: HttpMethod = name.parse().unwrap();
            assert_eq!(method.code(), code, "{name}");
            assert_eq!(HttpMethod::from_code(i64::from(code)).unwrap(), method);
            assert_eq!(method.to_string(), name);
        }
    }

    #[test]
    fn unknown_method_name_rejected() {
        assert!(matches!(
            "FETCH".parse::<HttpMethod>(),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn lowercase_method_name_rejected() {
        assert!("get".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn out_of_table_code_rejected() {
        assert!(HttpMethod::from_code(9).is_err());
        assert!(HttpMethod::from_code(-1).is_err());
    }

    // -- RequestPayload --

    #[test]
    fn example_request_validates() {
        let event = parse_request(request_json(json!("GET"))).unwrap();
        assert_eq!(event.method, HttpMethod::Get);
        assert_eq!(event.method.code(), 0);
        assert_eq!(event.status, 200);
        assert_eq!(event.response_time, 42);
        assert_eq!(event.framework, 1);
        assert_eq!(event.path, "/users");
        assert_eq!(event.created_at, received_at());
        assert!(event.hostname.is_none());
        assert!(event.user_agent.is_none());
    }

    #[test]
    fn legacy_numeric_method_accepted() {
        let event = parse_request(request_json(json!(4))).unwrap();
        assert_eq!(event.method, HttpMethod::Delete);
    }

    #[test]
    fn unknown_method_in_payload_rejected() {
        let err = parse_request(request_json(json!("BREW"))).unwrap_err();
        assert!(err.to_string().contains("BREW"));
    }

    #[test]
    fn numeric_strings_accepted_for_integers() {
        let mut body = request_json(json!("POST"));
        body["status"] = json!("201");
        body["response_time"] = json!(" 17 ");
        let event = parse_request(body).unwrap();
        assert_eq!(event.status, 201);
        assert_eq!(event.response_time, 17);
    }

    #[test]
    fn negative_response_time_rejected() {
        let mut body = request_json(json!("GET"));
        body["response_time"] = json!(-5);
        let err = parse_request(body).unwrap_err();
        assert!(err.to_string().contains("response_time"));
    }

    #[test]
    fn out_of_range_status_rejected() {
        let mut body = request_json(json!("GET"));
        body["status"] = json!(70_000);
        assert!(parse_request(body).is_err());
    }

    #[test]
    fn non_numeric_status_rejected() {
        let mut body = request_json(json!("GET"));
        body["status"] = json!("ok");
        assert!(parse_request(body).is_err());
    }

    #[test]
    fn empty_api_key_rejected() {
        let mut body = request_json(json!("GET"));
        body["api_key"] = json!("  ");
        let err = parse_request(body).unwrap_err();
        assert!(err.to_string().contains("api_key is required"));
    }

    #[test]
    fn malformed_api_key_rejected() {
        let mut body = request_json(json!("GET"));
        body["api_key"] = json!("not-a-key");
        assert!(parse_request(body).is_err());
    }

    #[test]
    fn null_and_empty_optional_fields_stay_distinct() {
        let mut body = request_json(json!("GET"));
        body["hostname"] = json!("");
        body["user_agent"] = serde_json::Value::Null;
        let event = parse_request(body).unwrap();
        assert_eq!(event.hostname.as_deref(), Some(""));
        assert!(event.user_agent.is_none());
    }

    #[test]
    fn client_timestamp_normalized_to_utc() {
        let mut body = request_json(json!("GET"));
        body["created_at"] = json!("2024-03-01T14:30:00+02:00");
        let event = parse_request(body).unwrap();
        assert_eq!(
            event.created_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn long_fields_truncated_on_char_boundary() {
        let mut body = request_json(json!("GET"));
        body["path"] = json!("é".repeat(300));
        let event = parse_request(body).unwrap();
        assert_eq!(event.path.chars().count(), MAX_FIELD_LEN);
    }

    #[test]
    fn with_origin_sets_ip_and_location() {
        let event = parse_request(request_json(json!("GET")))
            .unwrap()
            .with_origin(Some("203.0.113.9".parse().unwrap()), Some("GB".into()));
        assert_eq!(event.ip_address, Some("203.0.113.9".parse().unwrap()));
        assert_eq!(event.location.as_deref(), Some("GB"));
    }

    // -- RequestBatchPayload --

    #[test]
    fn batch_payload_rejected_when_any_element_invalid() {
        let payload: RequestBatchPayload = serde_json::from_value(json!({
            "api_key": KEY,
            "framework": 0,
            "requests": [
                {"path": "/a", "method": "GET", "status": 200, "response_time": 1},
                {"path": "/b", "method": "NOPE", "status": 200, "response_time": 1},
            ],
        }))
        .unwrap();
        let err = payload.validate(received_at()).unwrap_err();
        assert!(err.to_string().contains("requests[1]"), "got: {err}");
    }

    #[test]
    fn batch_payload_shares_key_and_framework() {
        let payload: RequestBatchPayload = serde_json::from_value(json!({
            "api_key": KEY,
            "framework": 12,
            "requests": [
                {"path": "/a", "method": "GET", "status": 200, "response_time": 1},
                {"path": "/b", "method": "POST", "status": 201, "response_time": 2},
            ],
        }))
        .unwrap();
        let events = payload.validate(received_at()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.framework == 12));
        assert_eq!(events[0].path, "/a");
        assert_eq!(events[1].method, HttpMethod::Post);
    }

    // -- Monitor / Ping --

    #[test]
    fn monitor_requires_url() {
        let payload: MonitorPayload =
            serde_json::from_value(json!({"api_key": KEY, "url": ""})).unwrap();
        assert!(payload.validate(received_at()).is_err());
    }

    #[test]
    fn monitor_flags_default_to_false() {
        let payload: MonitorPayload =
            serde_json::from_value(json!({"api_key": KEY, "url": "example.com"})).unwrap();
        let event = payload.validate(received_at()).unwrap();
        assert!(!event.secure);
        assert!(!event.ping);
    }

    #[test]
    fn ping_validates_integers() {
        let payload: PingPayload = serde_json::from_value(json!({
            "api_key": KEY,
            "url": "https://example.com",
            "response_time": 120,
            "status": 503,
        }))
        .unwrap();
        let event = payload.validate(received_at()).unwrap();
        assert_eq!(event.status, 503);
        assert_eq!(event.response_time, 120);
    }
}
