use {
    base64::{
        Engine,
        engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    },
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    types::{AuthMethod, IssuedTokens, Provider, serialize_option_secret, serialize_secret},
};

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A bearer credential for one provider, as persisted by the credential store.
#[derive(Debug, Serialize, Deserialize)]
pub struct Credential {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub refresh_token: Option<Secret<String>>,
    /// Unix timestamp when the access token expires. `None` (or 0) means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    pub provider: Provider,
    pub auth_method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl Credential {
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            None | Some(0) => false,
            Some(ts) => ts <= now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    pub fn is_usable_at(&self, now: u64) -> bool {
        !self.access_token.expose_secret().is_empty() && !self.is_expired_at(now)
    }

    /// Seconds until expiry, or `None` for a non-expiring credential.
    pub fn remaining_secs(&self, now: u64) -> Option<u64> {
        match self.expires_at {
            None | Some(0) => None,
            Some(ts) => Some(ts.saturating_sub(now)),
        }
    }
}

/// Turn what the store returned into a credential an API client may use.
///
/// Refresh is not supported, so an expired credential always means logging in again.
pub fn require_usable(
    stored: Option<Credential>,
    provider: Provider,
    now: u64,
) -> Result<Credential> {
    let credential = stored.ok_or(Error::MissingCredential { provider })?;
    if credential.is_expired_at(now) {
        return Err(Error::ExpiredCredential { provider });
    }
    if !credential.is_usable_at(now) {
        return Err(Error::MissingCredential { provider });
    }
    Ok(credential)
}

/// Build the credential record for a successful login.
pub fn assemble(provider: Provider, tokens: IssuedTokens) -> Credential {
    let account_id = extract_account_id(tokens.access_token.expose_secret());
    Credential {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: tokens.expires_at,
        provider,
        auth_method: AuthMethod::OAuth,
        account_id,
    }
}

/// Best-effort `sub` claim from a JWT-shaped token.
///
/// The token stays opaque for every authenticated call; this only feeds the
/// account id shown to the operator and never fails.
pub fn extract_account_id(access_token: &str) -> Option<String> {
    let mut segments = access_token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let payload = payload.trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| debug!(error = %e, "access token payload is not base64"))
        .ok()?;

    let claims: serde_json::Value = serde_json::from_slice(&decoded)
        .map_err(|e| debug!(error = %e, "access token payload is not JSON"))
        .ok()?;

    claims
        .get("sub")
        .and_then(serde_json::Value::as_str)
        .filter(|sub| !sub.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_payload(payload: &str) -> String {
        format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    fn credential(expires_at: Option<u64>) -> Credential {
        Credential {
            access_token: Secret::new("tok".into()),
            refresh_token: None,
            expires_at,
            provider: Provider::Qwen,
            auth_method: AuthMethod::OAuth,
            account_id: None,
        }
    }

    #[test]
    fn extracts_sub_claim() {
        let token = jwt_with_payload(r#"{"sub":"user-42","iss":"aliyun"}"#);
        assert_eq!(extract_account_id(&token).as_deref(), Some("user-42"));
    }

    #[test]
    fn accepts_standard_alphabet_and_padding() {
        let std = base64::engine::general_purpose::STANDARD.encode(r#"{"sub":"ÿÿÿ"}"#);
        assert!(std.contains('/') && std.ends_with('='));
        let token = format!("h.{std}.s");
        assert_eq!(extract_account_id(&token).as_deref(), Some("ÿÿÿ"));
    }

    #[test]
    fn malformed_tokens_yield_no_account_id() {
        assert_eq!(extract_account_id("opaque-token"), None);
        assert_eq!(extract_account_id("only.two"), None);
        assert_eq!(extract_account_id("a.b.c.d"), None);
        assert_eq!(extract_account_id("abc.!!!not-base64!!!.sig"), None);
        assert_eq!(extract_account_id(&jwt_with_payload("not json")), None);
        assert_eq!(extract_account_id(&jwt_with_payload(r#"{"iss":"x"}"#)), None);
        assert_eq!(extract_account_id(&jwt_with_payload(r#"{"sub":42}"#)), None);
        assert_eq!(extract_account_id(&jwt_with_payload(r#"{"sub":""}"#)), None);
        assert_eq!(extract_account_id(""), None);
    }

    #[test]
    fn assemble_sets_oauth_fields() {
        let tokens = IssuedTokens {
            access_token: Secret::new(jwt_with_payload(r#"{"sub":"acct"}"#)),
            refresh_token: Some(Secret::new("refresh".into())),
            expires_at: Some(99),
            token_type: Some("Bearer".into()),
        };
        let cred = assemble(Provider::Qwen, tokens);
        assert_eq!(cred.provider, Provider::Qwen);
        assert_eq!(cred.auth_method, AuthMethod::OAuth);
        assert_eq!(cred.account_id.as_deref(), Some("acct"));
        assert_eq!(cred.expires_at, Some(99));
        assert_eq!(cred.refresh_token.unwrap().expose_secret(), "refresh");
    }

    #[test]
    fn assemble_tolerates_opaque_tokens() {
        let tokens = IssuedTokens {
            access_token: Secret::new("opaque".into()),
            refresh_token: None,
            expires_at: None,
            token_type: None,
        };
        let cred = assemble(Provider::Qwen, tokens);
        assert_eq!(cred.access_token.expose_secret(), "opaque");
        assert_eq!(cred.account_id, None);
    }

    #[test]
    fn expiry_rules() {
        let now = 1_000;
        assert!(!credential(None).is_expired_at(now));
        assert!(!credential(Some(0)).is_expired_at(now));
        assert!(credential(Some(999)).is_expired_at(now));
        assert!(credential(Some(1_000)).is_expired_at(now));
        assert!(!credential(Some(1_001)).is_expired_at(now));
        assert!(!credential(None).is_expired_at(u64::MAX));
    }

    #[test]
    fn remaining_secs() {
        assert_eq!(credential(None).remaining_secs(10), None);
        assert_eq!(credential(Some(70)).remaining_secs(10), Some(60));
        assert_eq!(credential(Some(5)).remaining_secs(10), Some(0));
    }

    #[test]
    fn require_usable_maps_to_credential_errors() {
        let err = require_usable(None, Provider::Qwen, 10).unwrap_err();
        assert!(matches!(err, Error::MissingCredential { .. }));

        let err = require_usable(Some(credential(Some(5))), Provider::Qwen, 10).unwrap_err();
        assert!(matches!(err, Error::ExpiredCredential { .. }));

        let mut empty = credential(None);
        empty.access_token = Secret::new(String::new());
        let err = require_usable(Some(empty), Provider::Qwen, 10).unwrap_err();
        assert!(matches!(err, Error::MissingCredential { .. }));

        assert!(require_usable(Some(credential(Some(50))), Provider::Qwen, 10).is_ok());
    }

    #[test]
    fn serializes_secrets_in_clear_and_round_trips() {
        let mut cred = credential(Some(123));
        cred.account_id = Some("acct".into());
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["access_token"], "tok");
        assert_eq!(json["provider"], "qwen");
        assert_eq!(json["auth_method"], "oauth");
        assert!(json.get("refresh_token").is_none());

        let back: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(back.access_token.expose_secret(), "tok");
        assert_eq!(back.expires_at, Some(123));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", credential(None));
        assert!(!rendered.contains("\"tok\""));
    }
}
