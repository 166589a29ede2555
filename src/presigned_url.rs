//! Presigned URLs for WebSocket (`execute-api`) handshakes.
//!
//! A WebSocket client cannot attach authorization headers during the
//! handshake, so the whole AWS Signature Version 4 computation is carried in
//! the query string instead. The produced URL is valid for 300 seconds and
//! only for the exact path, host, region and timestamp it was built with.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "execute-api";
const EXPIRES_SECONDS: u32 = 300;
const DEFAULT_REGION: &str = "us-east-1";

/// Percent-encodes everything but unreserved characters.
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha256 = Hmac<Sha256>;

/// Signs WebSocket connection URLs with temporary or long-lived credentials.
///
/// The signature binds the (path, query, timestamp) triple; changing any of
/// them invalidates it.
pub struct WebSocketPresignedUrl {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    endpoint: String,
    path: String,
    host: String,
    region: String,
}

impl WebSocketPresignedUrl {
    /// Creates a signer for the given endpoint.
    ///
    /// `region` falls back to `us-east-1` when `None`. An empty session
    /// token is treated as absent.
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: Option<String>,
        endpoint: impl Into<String>,
        path: impl Into<String>,
        host: impl Into<String>,
        region: Option<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: session_token.filter(|t| !t.is_empty()),
            endpoint: endpoint.into(),
            path: path.into(),
            host: host.into(),
            region: region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }

    /// Builds the signed URL for the current time.
    ///
    /// Fails if:
    /// - `host` is empty
    /// - `path` is empty
    pub fn request_url(&self) -> Result<String> {
        self.request_url_at(Utc::now())
    }

    /// Builds the signed URL for an explicit timestamp.
    ///
    /// Deterministic given identical inputs and `now`; used directly by
    /// tests and by [`WebSocketPresignedUrl::request_url`].
    pub fn request_url_at(&self, now: DateTime<Utc>) -> Result<String> {
        if self.host.is_empty() {
            return Err(Error::Validation("host must not be empty".to_string()));
        }
        if self.path.is_empty() {
            return Err(Error::Validation("path must not be empty".to_string()));
        }

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();

        let canonical_querystring =
            self.canonical_querystring(&amz_date, &datestamp);
        let canonical_headers = format!("host:{}\n", self.host);
        let payload_hash = sha256_hex("");
        let canonical_request = format!(
            "GET\n{}\n{}\n{}\nhost\n{}",
            self.path, canonical_querystring, canonical_headers, payload_hash,
        );

        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            datestamp, self.region, SERVICE,
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            sha256_hex(&canonical_request),
        );

        let signing_key = self.signing_key(&datestamp);
        let signature = hex::encode(hmac_sha256(&signing_key, &string_to_sign));

        Ok(format!(
            "{}{}?{}&X-Amz-Signature={}",
            self.endpoint, self.path, canonical_querystring, signature,
        ))
    }

    /// Query parameters in the exact order the signing authority expects.
    fn canonical_querystring(&self, amz_date: &str, datestamp: &str) -> String {
        let scope = format!(
            "{}%2F{}%2F{}%2Faws4_request",
            datestamp, self.region, SERVICE,
        );
        let mut qs = format!("X-Amz-Algorithm={ALGORITHM}");
        qs.push_str(&format!(
            "&X-Amz-Credential={}%2F{}",
            self.access_key, scope,
        ));
        qs.push_str(&format!("&X-Amz-Date={amz_date}"));
        qs.push_str(&format!("&X-Amz-Expires={EXPIRES_SECONDS}"));
        if let Some(token) = self.session_token.as_deref() {
            qs.push_str(&format!(
                "&X-Amz-Security-Token={}",
                utf8_percent_encode(token, QUERY_ENCODE),
            ));
        }
        qs.push_str("&X-Amz-SignedHeaders=host");
        qs
    }

    /// Four chained HMAC-SHA256 operations seeded with `"AWS4" + secret`.
    fn signing_key(&self, datestamp: &str) -> Vec<u8> {
        let k_secret = format!("AWS4{}", self.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), datestamp);
        let k_region = hmac_sha256(&k_date, &self.region);
        let k_service = hmac_sha256(&k_region, SERVICE);
        hmac_sha256(&k_service, "aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key)
        .expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, 1, 12, 30, 45).unwrap()
    }

    fn signer() -> WebSocketPresignedUrl {
        WebSocketPresignedUrl::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
            "wss://ws.example.execute-api.us-east-1.amazonaws.com",
            "/prod",
            "ws.example.execute-api.us-east-1.amazonaws.com",
            None,
        )
    }

    fn signature_of(url: &str) -> String {
        url.rsplit("X-Amz-Signature=").next().unwrap().to_string()
    }

    #[test]
    fn request_url_should_be_deterministic_for_a_fixed_timestamp() {
        let first = signer().request_url_at(fixed_now()).unwrap();
        let second = signer().request_url_at(fixed_now()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn request_url_should_start_with_endpoint_path_and_algorithm() {
        let url = signer().request_url_at(fixed_now()).unwrap();
        assert!(url.starts_with(
            "wss://ws.example.execute-api.us-east-1.amazonaws.com/prod\
             ?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Credential=AKIDEXAMPLE%2F\
             20230501%2Fus-east-1%2Fexecute-api%2Faws4_request\
             &X-Amz-Date=20230501T123045Z&X-Amz-Expires=300\
             &X-Amz-SignedHeaders=host&X-Amz-Signature=",
        ));
    }

    #[test]
    fn request_url_should_change_signature_when_path_changes() {
        let base = signer().request_url_at(fixed_now()).unwrap();
        let other = WebSocketPresignedUrl::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
            "wss://ws.example.execute-api.us-east-1.amazonaws.com",
            "/dev",
            "ws.example.execute-api.us-east-1.amazonaws.com",
            None,
        )
        .request_url_at(fixed_now())
        .unwrap();
        assert_ne!(signature_of(&base), signature_of(&other));
    }

    #[test]
    fn request_url_should_change_signature_when_host_changes() {
        let base = signer().request_url_at(fixed_now()).unwrap();
        let other = WebSocketPresignedUrl::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
            "wss://ws.example.execute-api.us-east-1.amazonaws.com",
            "/prod",
            "other.example.execute-api.us-east-1.amazonaws.com",
            None,
        )
        .request_url_at(fixed_now())
        .unwrap();
        assert_ne!(signature_of(&base), signature_of(&other));
    }

    #[test]
    fn request_url_should_change_signature_when_region_changes() {
        let base = signer().request_url_at(fixed_now()).unwrap();
        let other = WebSocketPresignedUrl::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
            "wss://ws.example.execute-api.us-east-1.amazonaws.com",
            "/prod",
            "ws.example.execute-api.us-east-1.amazonaws.com",
            Some("eu-west-1".to_string()),
        )
        .request_url_at(fixed_now())
        .unwrap();
        assert_ne!(signature_of(&base), signature_of(&other));
    }

    #[test]
    fn request_url_should_include_percent_encoded_session_token() {
        let url = WebSocketPresignedUrl::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            Some("token/with+special=chars".to_string()),
            "wss://ws.example.execute-api.us-east-1.amazonaws.com",
            "/prod",
            "ws.example.execute-api.us-east-1.amazonaws.com",
            None,
        )
        .request_url_at(fixed_now())
        .unwrap();
        assert!(url.contains(
            "&X-Amz-Security-Token=token%2Fwith%2Bspecial%3Dchars\
             &X-Amz-SignedHeaders=host",
        ));
        assert_ne!(
            signature_of(&url),
            signature_of(&signer().request_url_at(fixed_now()).unwrap()),
        );
    }

    #[test]
    fn request_url_should_treat_empty_session_token_as_absent() {
        let url = WebSocketPresignedUrl::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            Some(String::new()),
            "wss://ws.example.execute-api.us-east-1.amazonaws.com",
            "/prod",
            "ws.example.execute-api.us-east-1.amazonaws.com",
            None,
        )
        .request_url_at(fixed_now())
        .unwrap();
        assert!(!url.contains("X-Amz-Security-Token"));
    }

    #[test]
    fn request_url_should_fail_if_host_is_empty() {
        let result = WebSocketPresignedUrl::new(
            "AKIDEXAMPLE",
            "secret",
            None,
            "wss://example.com",
            "/prod",
            "",
            None,
        )
        .request_url_at(fixed_now());
        assert!(result.is_err());
    }

    #[test]
    fn request_url_should_fail_if_path_is_empty() {
        let result = WebSocketPresignedUrl::new(
            "AKIDEXAMPLE",
            "secret",
            None,
            "wss://example.com",
            "",
            "example.com",
            None,
        )
        .request_url_at(fixed_now());
        assert!(result.is_err());
    }

    #[test]
    fn canonical_request_rebuilt_from_query_string_reproduces_string_to_sign() {
        let url = signer().request_url_at(fixed_now()).unwrap();
        let query = url.split('?').nth(1).unwrap();
        let unsigned_query =
            query.rsplit_once("&X-Amz-Signature=").unwrap().0;

        let canonical_request = format!(
            "GET\n/prod\n{}\nhost:ws.example.execute-api.us-east-1\
             .amazonaws.com\n\nhost\n{}",
            unsigned_query,
            sha256_hex(""),
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n20230501T123045Z\n\
             20230501/us-east-1/execute-api/aws4_request\n{}",
            sha256_hex(&canonical_request),
        );

        let signing_key = signer().signing_key("20230501");
        let expected =
            hex::encode(hmac_sha256(&signing_key, &string_to_sign));
        assert_eq!(signature_of(&url), expected);
    }
}
