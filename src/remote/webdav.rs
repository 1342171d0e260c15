//! WebDAV mail endpoint.
//!
//! Messages are addressed as `{base}/{account}/messages/{id}` and folders as
//! `{base}/{account}/folders/{name}/`. Flags are stored as dead properties in
//! the `urn:mail-sync:flags` namespace.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode};

use crate::config::RemoteConfig;

use super::endpoint::{FlagsDelta, RemoteEndpoint, RemoteError, RemoteResult};

const FLAGS_NAMESPACE: &str = "urn:mail-sync:flags";

/// WebDAV-backed implementation of `RemoteEndpoint`.
#[derive(Clone)]
pub struct WebDavEndpoint {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl WebDavEndpoint {
    pub fn new(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn message_url(&self, account_id: &str, target_id: &str) -> String {
        format!(
            "{}/{}/messages/{}",
            self.base_url,
            urlencoding::encode(account_id),
            urlencoding::encode(target_id)
        )
    }

    fn folder_message_url(&self, account_id: &str, folder: &str, target_id: &str) -> String {
        format!(
            "{}/{}/folders/{}/{}",
            self.base_url,
            urlencoding::encode(account_id),
            urlencoding::encode(folder),
            urlencoding::encode(target_id)
        )
    }

    fn outbox_url(&self, account_id: &str) -> String {
        format!("{}/{}/outbox", self.base_url, urlencoding::encode(account_id))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    /// Send the request and map the response to a `RemoteResult`.
    async fn execute(&self, call: &str, request: RequestBuilder, missing_ok: bool) -> RemoteResult {
        let response = request.send().await.map_err(|e| {
            tracing::debug!(call = call, error = %e, "WebDAV request failed");
            RemoteError::Transient(e.to_string())
        })?;

        let status = response.status();
        if missing_ok && status == StatusCode::NOT_FOUND {
            tracing::debug!(call = call, "Resource already gone, treating as applied");
            return Ok(());
        }

        if status == StatusCode::MULTI_STATUS {
            let body = response
                .text()
                .await
                .map_err(|e| RemoteError::Transient(e.to_string()))?;
            return check_multistatus(&body);
        }

        classify_status(status)
    }
}

/// Map an HTTP status to success, a transient failure or a rejection.
pub fn classify_status(status: StatusCode) -> RemoteResult {
    if status.is_success() {
        return Ok(());
    }

    let reason = status.canonical_reason().unwrap_or("unknown").to_string();
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        Err(RemoteError::Transient(format!("{} {}", status.as_u16(), reason)))
    } else {
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: reason,
        })
    }
}

/// Fail on the first non-2xx `status` element of a 207 Multi-Status body.
///
/// A body that cannot be parsed counts as a transient failure, so the record
/// stays queued.
fn check_multistatus(body: &str) -> RemoteResult {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut in_status = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"status" => in_status = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"status" => in_status = false,
            Ok(Event::Text(t)) if in_status => {
                let line = t
                    .unescape()
                    .map_err(|e| RemoteError::Transient(format!("Malformed multistatus body: {}", e)))?;
                let status = parse_status_line(&line).ok_or_else(|| {
                    RemoteError::Transient(format!("Unrecognized multistatus status: {}", line))
                })?;
                classify_status(status)?;
            }
            Ok(Event::Eof) => return Ok(()),
            Err(e) => {
                return Err(RemoteError::Transient(format!("Malformed multistatus body: {}", e)));
            }
            _ => {}
        }
    }
}

/// Status code from a line such as `HTTP/1.1 423 Locked`.
fn parse_status_line(line: &str) -> Option<StatusCode> {
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?.parse::<u16>().ok()?;
    StatusCode::from_u16(code).ok()
}

/// PROPPATCH body applying the delta: `true` sets the property, `false`
/// removes it.
fn proppatch_body(delta: FlagsDelta) -> String {
    let mut set = String::new();
    let mut remove = String::new();

    for (name, value) in [("seen", delta.seen), ("flagged", delta.flagged)] {
        match value {
            Some(true) => set.push_str(&format!("<F:{}>1</F:{}>", name, name)),
            Some(false) => remove.push_str(&format!("<F:{}/>", name)),
            None => {}
        }
    }

    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><D:propertyupdate xmlns:D="DAV:" xmlns:F="{}">"#,
        FLAGS_NAMESPACE
    );
    if !set.is_empty() {
        body.push_str(&format!("<D:set><D:prop>{}</D:prop></D:set>", set));
    }
    if !remove.is_empty() {
        body.push_str(&format!("<D:remove><D:prop>{}</D:prop></D:remove>", remove));
    }
    body.push_str("</D:propertyupdate>");
    body
}

#[async_trait]
impl RemoteEndpoint for WebDavEndpoint {
    async fn update_flags(&self, account_id: &str, target_id: &str, delta: FlagsDelta) -> RemoteResult {
        if delta.is_empty() {
            return Ok(());
        }

        let method = Method::from_bytes(b"PROPPATCH")
            .map_err(|e| RemoteError::InvalidOperation(e.to_string()))?;
        let request = self
            .request(method, &self.message_url(account_id, target_id))
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(proppatch_body(delta));

        self.execute("update_flags", request, false).await
    }

    async fn delete_resource(&self, account_id: &str, target_id: &str) -> RemoteResult {
        let request = self.request(Method::DELETE, &self.message_url(account_id, target_id));
        self.execute("delete_resource", request, true).await
    }

    async fn move_resource(&self, account_id: &str, target_id: &str, destination: &str) -> RemoteResult {
        let method = Method::from_bytes(b"MOVE")
            .map_err(|e| RemoteError::InvalidOperation(e.to_string()))?;
        let request = self
            .request(method, &self.message_url(account_id, target_id))
            .header("Destination", self.folder_message_url(account_id, destination, target_id))
            .header("Overwrite", "T");

        self.execute("move_resource", request, false).await
    }

    async fn send_resource(&self, account_id: &str, payload: &str) -> RemoteResult {
        let request = self
            .request(Method::POST, &self.outbox_url(account_id))
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string());

        self.execute("send_resource", request, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> WebDavEndpoint {
        WebDavEndpoint::new(&RemoteConfig {
            base_url: "https://dav.example.com/mail/".to_string(),
            ..RemoteConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let ep = endpoint();
        assert_eq!(ep.base_url(), "https://dav.example.com/mail");
        assert_eq!(
            ep.message_url("me@example.com", "msg 1"),
            "https://dav.example.com/mail/me%40example.com/messages/msg%201"
        );
        assert_eq!(
            ep.folder_message_url("acct", "Sent Items", "42"),
            "https://dav.example.com/mail/acct/folders/Sent%20Items/42"
        );
        assert_eq!(ep.outbox_url("acct"), "https://dav.example.com/mail/acct/outbox");
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::OK).is_ok());
        assert!(classify_status(StatusCode::NO_CONTENT).is_ok());
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Err(RemoteError::Transient(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Err(RemoteError::Transient(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            Err(RemoteError::Rejected { status: 403, .. })
        ));
    }

    #[test]
    fn test_proppatch_body() {
        let body = proppatch_body(FlagsDelta::seen(true));
        assert!(body.contains("<D:set><D:prop><F:seen>1</F:seen></D:prop></D:set>"));
        assert!(!body.contains("D:remove"));

        let body = proppatch_body(FlagsDelta::flagged(false));
        assert!(body.contains("<D:remove><D:prop><F:flagged/></D:prop></D:remove>"));
        assert!(!body.contains("D:set"));
    }

    #[test]
    fn test_multistatus_all_ok() {
        let body = r#"<?xml version="1.0"?>
            <D:multistatus xmlns:D="DAV:">
              <D:response>
                <D:href>/mail/acct/messages/1</D:href>
                <D:propstat><D:prop/><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
              </D:response>
            </D:multistatus>"#;
        assert!(check_multistatus(body).is_ok());
    }

    #[test]
    fn test_multistatus_reports_first_failure() {
        let body = r#"<D:multistatus xmlns:D="DAV:"><D:response>
            <D:propstat><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
            <D:propstat><D:status>HTTP/1.1 423 Locked</D:status></D:propstat>
            </D:response></D:multistatus>"#;
        assert!(matches!(
            check_multistatus(body),
            Err(RemoteError::Rejected { status: 423, .. })
        ));
    }

    #[test]
    fn test_multistatus_any_http_version() {
        let body = r#"<d:multistatus xmlns:d="DAV:"><d:response><d:propstat>
            <d:status>HTTP/1.0 403 Forbidden</d:status>
            </d:propstat></d:response></d:multistatus>"#;
        assert!(matches!(
            check_multistatus(body),
            Err(RemoteError::Rejected { status: 403, .. })
        ));
    }

    #[test]
    fn test_multistatus_malformed_stays_queued() {
        assert!(matches!(
            check_multistatus("<D:multistatus><D:status>HTTP/1.1 200 OK</D:response>"),
            Err(RemoteError::Transient(_))
        ));
        assert!(matches!(
            check_multistatus("<D:status>garbage</D:status>"),
            Err(RemoteError::Transient(_))
        ));
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line("HTTP/2 507 Insufficient Storage"), Some(StatusCode::INSUFFICIENT_STORAGE));
        assert_eq!(parse_status_line("HTTP/1.1 200 OK"), Some(StatusCode::OK));
        assert_eq!(parse_status_line("200 OK"), None);
    }

    #[test]
    fn test_segments_are_percent_encoded() {
        let ep = endpoint();
        assert_eq!(
            ep.message_url("abc-DEF_1.2~", "a/b"),
            "https://dav.example.com/mail/abc-DEF_1.2~/messages/a%2Fb"
        );
    }
}
