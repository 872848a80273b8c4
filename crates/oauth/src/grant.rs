//! Grant issuance and grant status requests.

use {
    reqwest::header::ACCEPT,
    serde::Deserialize,
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    pkce,
    types::{GrantStatus, GrantTicket, QrOAuthConfig, StatusReport},
};

/// `{code, message, data}` wrapper used by both grant endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: Option<serde_json::Value>,
    message: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn describe(&self) -> String {
        let code = self.code.as_ref().map(|c| match c {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        match (code, self.message.as_deref()) {
            (Some(code), Some(msg)) => format!(" (server said {code}: {msg})"),
            (Some(code), None) => format!(" (server code {code})"),
            (None, Some(msg)) => format!(" (server said: {msg})"),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantData {
    qr_code_url: Option<String>,
    qr_code_id: Option<String>,
    redirect_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    status: Option<GrantStatus>,
    code: Option<String>,
}

/// Ask the authorization server for a QR-code bound grant.
pub async fn request_grant(
    client: &reqwest::Client,
    config: &QrOAuthConfig,
    state: &str,
    code_challenge: &str,
) -> Result<GrantTicket> {
    let scope = config.scopes.join(" ");
    let resp = client
        .get(&config.grant_url)
        .header(ACCEPT, "application/json")
        .query(&[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("state", state),
            ("code_challenge", code_challenge),
            ("code_challenge_method", pkce::CHALLENGE_METHOD),
            ("scope", scope.as_str()),
        ])
        .timeout(config.request_timeout)
        .send()
        .await?;

    let body = success_body(resp, "grant request").await?;
    let ticket = parse_grant_response(&body)?;

    info!(qr_code_id = %ticket.qr_code_id, "authorization grant issued");
    Ok(ticket)
}

/// Query the current status of a grant by its QR code id.
pub async fn grant_status(
    client: &reqwest::Client,
    config: &QrOAuthConfig,
    qr_code_id: &str,
) -> Result<StatusReport> {
    let resp = client
        .get(&config.status_url)
        .header(ACCEPT, "application/json")
        .query(&[("id", qr_code_id)])
        .timeout(config.request_timeout)
        .send()
        .await?;

    let body = success_body(resp, "grant status request").await?;
    let report = parse_status_response(&body)?;
    debug!(qr_code_id, status = %report.status, "grant status");
    Ok(report)
}

/// Body of a 2xx response; any other status is a protocol error, even if the body parses.
async fn success_body(resp: reqwest::Response, what: &str) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::protocol(format!(
            "{what} failed with HTTP {}: {}",
            status.as_u16(),
            snippet(&body)
        )));
    }
    Ok(body)
}

fn parse_grant_response(body: &str) -> Result<GrantTicket> {
    let envelope: Envelope<GrantData> = serde_json::from_str(body).map_err(|e| {
        Error::protocol(format!(
            "grant response is not valid JSON ({e}): {}",
            snippet(body)
        ))
    })?;

    let detail = envelope.describe();
    let data = envelope.data.unwrap_or_default();
    match (non_empty(data.qr_code_id), non_empty(data.qr_code_url)) {
        (Some(qr_code_id), Some(qr_code_url)) => Ok(GrantTicket {
            qr_code_id,
            qr_code_url,
            redirect_uri: non_empty(data.redirect_uri),
        }),
        (None, _) => Err(Error::protocol(format!(
            "grant response has no qrCodeId{detail}"
        ))),
        (_, None) => Err(Error::protocol(format!(
            "grant response has no qrCodeUrl{detail}"
        ))),
    }
}

fn parse_status_response(body: &str) -> Result<StatusReport> {
    let envelope: Envelope<StatusData> = serde_json::from_str(body).map_err(|e| {
        Error::protocol(format!(
            "grant status response is not valid JSON ({e}): {}",
            snippet(body)
        ))
    })?;

    let detail = envelope.describe();
    let data = envelope.data.unwrap_or_default();
    let status = data
        .status
        .ok_or_else(|| Error::protocol(format!("grant status response has no status{detail}")))?;

    Ok(StatusReport {
        status,
        code: non_empty(data.code),
        message: envelope.message.filter(|m| !m.trim().is_empty()),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// First part of a response body, for error messages.
pub(crate) fn snippet(body: &str) -> &str {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::Matcher;

    use super::*;

    fn config_for(server: &mockito::Server) -> QrOAuthConfig {
        QrOAuthConfig {
            client_id: "test_client".into(),
            grant_url: format!("{}/v1/oauth/qrcode", server.url()),
            status_url: format!("{}/v1/oauth/qrcode/status", server.url()),
            token_url: format!("{}/v1/oauth/token", server.url()),
            redirect_uri: "oob".into(),
            scopes: vec!["openid".into(), "profile".into()],
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn parses_grant_response() {
        let body = r#"{"code":"200","message":"ok","data":{"qrCodeUrl":"https://qr.example/abc","qrCodeId":"abc","redirectUri":"oob","refreshToken":""}}"#;
        let ticket = parse_grant_response(body).unwrap();
        assert_eq!(ticket.qr_code_id, "abc");
        assert_eq!(ticket.qr_code_url, "https://qr.example/abc");
        assert_eq!(ticket.redirect_uri.as_deref(), Some("oob"));
    }

    #[test]
    fn grant_response_without_qr_code_id_is_protocol_error() {
        let body = r#"{"code":"InvalidClient","message":"unknown client","data":{"qrCodeUrl":"https://qr.example/abc"}}"#;
        let err = parse_grant_response(body).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        let msg = err.to_string();
        assert!(msg.contains("qrCodeId"));
        assert!(msg.contains("unknown client"));
    }

    #[test]
    fn grant_response_without_data_is_protocol_error() {
        let err = parse_grant_response(r#"{"code":"500","message":"boom"}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn non_json_grant_response_is_protocol_error() {
        let err = parse_grant_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn parses_status_response() {
        let report =
            parse_status_response(r#"{"code":"200","data":{"status":"AUTHORIZED","code":"c0de"}}"#)
                .unwrap();
        assert_eq!(report.status, GrantStatus::Authorized);
        assert_eq!(report.code.as_deref(), Some("c0de"));

        let report =
            parse_status_response(r#"{"data":{"status":"PENDING","code":""}}"#).unwrap();
        assert_eq!(report.status, GrantStatus::Pending);
        assert_eq!(report.code, None);
    }

    #[test]
    fn status_response_without_status_is_protocol_error() {
        let err = parse_status_response(r#"{"data":{}}"#).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let body = "é".repeat(400);
        let s = snippet(&body);
        assert!(s.len() <= 512);
        assert!(body.starts_with(s));
    }

    #[tokio::test]
    async fn request_grant_sends_pkce_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/oauth/qrcode")
            .match_header("accept", "application/json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("response_type".into(), "code".into()),
                Matcher::UrlEncoded("client_id".into(), "test_client".into()),
                Matcher::UrlEncoded("state".into(), "s7a7e".into()),
                Matcher::UrlEncoded("code_challenge".into(), "ch4llenge".into()),
                Matcher::UrlEncoded("code_challenge_method".into(), "S256".into()),
                Matcher::UrlEncoded("scope".into(), "openid profile".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"200","data":{"qrCodeUrl":"https://qr.example/q1","qrCodeId":"q1"}}"#)
            .create_async()
            .await;

        let config = config_for(&server);
        let ticket = request_grant(&reqwest::Client::new(), &config, "s7a7e", "ch4llenge")
            .await
            .unwrap();
        assert_eq!(ticket.qr_code_id, "q1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn request_grant_reports_http_status_on_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/oauth/qrcode")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body(r#"{"code":"Unavailable","message":"try later"}"#)
            .create_async()
            .await;

        let config = config_for(&server);
        let err = request_grant(&reqwest::Client::new(), &config, "s", "c")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HTTP 503"), "{msg}");
        assert!(msg.contains("try later"), "{msg}");
    }

    #[tokio::test]
    async fn request_grant_rejects_error_status_with_valid_ticket() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/oauth/qrcode")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"code":"200","data":{"qrCodeUrl":"https://qr.example/q1","qrCodeId":"q1"}}"#)
            .create_async()
            .await;

        let config = config_for(&server);
        let err = request_grant(&reqwest::Client::new(), &config, "s", "c")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("HTTP 429"), "{err}");
    }

    #[tokio::test]
    async fn grant_status_error_status_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/oauth/qrcode/status")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"code":"200","data":{"status":"EXPIRED"}}"#)
            .create_async()
            .await;

        let config = config_for(&server);
        let err = grant_status(&reqwest::Client::new(), &config, "q1")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("HTTP 500"), "{err}");
    }

    #[tokio::test]
    async fn grant_status_queries_by_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/oauth/qrcode/status")
            .match_query(Matcher::UrlEncoded("id".into(), "q1".into()))
            .with_status(200)
            .with_body(r#"{"code":"200","data":{"status":"SCANNED"}}"#)
            .create_async()
            .await;

        let config = config_for(&server);
        let report = grant_status(&reqwest::Client::new(), &config, "q1")
            .await
            .unwrap();
        assert_eq!(report.status, GrantStatus::Scanned);
        mock.assert_async().await;
    }
}
