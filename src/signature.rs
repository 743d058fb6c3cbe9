//! Twilio request signature validation.
//!
//! Twilio signs each webhook with `base64(HMAC-SHA1(auth_token, url + params))`
//! where `params` is every POST parameter name followed by its value, sorted
//! by name. JSON deliveries instead carry a `bodySHA256` query parameter and
//! are signed over the URL alone.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";
const BODY_HASH_PARAM: &str = "bodySHA256";

pub struct RequestValidator {
    token: String,
}

impl fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequestValidator").finish_non_exhaustive()
    }
}

impl RequestValidator {
    pub fn new(token: impl Into<String>) -> Self {
        RequestValidator {
            token: token.into(),
        }
    }

    /// Base64 signature Twilio would send for `url` and `params`.
    pub fn compute_signature(&self, url: &str, params: &[(String, String)]) -> String {
        STANDARD.encode(self.mac(url, params).finalize().into_bytes())
    }

    /// Checks `signature` against the URL both with and without its default
    /// port, since Twilio may sign either form.
    pub fn validate(
        &self,
        url: &str,
        params: &[(String, String)],
        body: &[u8],
        signature: &str,
    ) -> bool {
        let Ok(expected) = STANDARD.decode(signature.trim()) else {
            return false;
        };

        let mut params = params;
        let mut body_ok = true;
        if let Some(body_hash) = query_param(url, BODY_HASH_PARAM) {
            body_ok = timing_safe_eq(compute_body_hash(body).as_bytes(), body_hash.as_bytes());
            params = &[];
        }

        let without_port = self.mac(&remove_port(url), params).verify_slice(&expected).is_ok();
        let with_port = self.mac(&add_port(url), params).verify_slice(&expected).is_ok();

        body_ok && (without_port || with_port)
    }

    fn mac(&self, url: &str, params: &[(String, String)]) -> HmacSha1 {
        let mut mac =
            HmacSha1::new_from_slice(self.token.as_bytes()).expect("HMAC accepts keys of any length");
        mac.update(url.as_bytes());

        let mut sorted: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (name, value) in params {
            sorted
                .entry(name.as_str())
                .or_default()
                .insert(value.as_str());
        }
        for (name, values) in sorted {
            for value in values {
                mac.update(name.as_bytes());
                mac.update(value.as_bytes());
            }
        }
        mac
    }
}

/// Lowercase hex SHA-256 of a raw request body.
pub fn compute_body_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Splits a URL into `(scheme, authority, rest)` where `rest` starts at the
/// path, query or end.
fn split_url(url: &str) -> Option<(&str, &str, &str)> {
    let (scheme, tail) = url.split_once("://")?;
    let end = tail.find(['/', '?', '#']).unwrap_or(tail.len());
    Some((scheme, &tail[..end], &tail[end..]))
}

fn host_and_port(authority: &str) -> (&str, Option<&str>) {
    match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            (host, Some(port))
        }
        _ => (authority, None),
    }
}

fn default_port(scheme: &str) -> Option<&'static str> {
    match scheme {
        "https" => Some("443"),
        "http" => Some("80"),
        _ => None,
    }
}

fn add_port(url: &str) -> String {
    let Some((scheme, authority, rest)) = split_url(url) else {
        return url.to_owned();
    };
    match (host_and_port(authority), default_port(scheme)) {
        ((host, None), Some(port)) => format!("{}://{}:{}{}", scheme, host, port, rest),
        _ => url.to_owned(),
    }
}

fn remove_port(url: &str) -> String {
    let Some((scheme, authority, rest)) = split_url(url) else {
        return url.to_owned();
    };
    match host_and_port(authority) {
        (host, Some(_)) => format!("{}://{}{}", scheme, host, rest),
        _ => url.to_owned(),
    }
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or_default();
    parse_form(query)
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// Decodes an `application/x-www-form-urlencoded` string, keeping repeated
/// names and their order.
pub fn parse_form(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "12345";
    const URL: &str = "https://mycompany.com/myapp.php?foo=1&bar=2";

    fn twilio_params() -> Vec<(String, String)> {
        [
            ("CallSid", "CA1234567890ABCDE"),
            ("Caller", "+12349013030"),
            ("Digits", "1234"),
            ("From", "+12349013030"),
            ("To", "+18005551212"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn computes_reference_signature() {
        // Worked example from Twilio's security documentation.
        let validator = RequestValidator::new(TOKEN);
        assert_eq!(
            validator.compute_signature(URL, &twilio_params()),
            "0/KCTR6DLpKmkAf8muzZqo1nDgQ="
        );
    }

    #[test]
    fn validates_matching_signature() {
        let validator = RequestValidator::new(TOKEN);
        let params = twilio_params();
        let signature = validator.compute_signature(URL, &params);
        assert!(validator.validate(URL, &params, b"", &signature));
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let validator = RequestValidator::new(TOKEN);
        let mut params = twilio_params();
        let signature = validator.compute_signature(URL, &params);
        params.reverse();
        assert!(validator.validate(URL, &params, b"", &signature));
    }

    #[test]
    fn rejects_tampered_params() {
        let validator = RequestValidator::new(TOKEN);
        let mut params = twilio_params();
        let signature = validator.compute_signature(URL, &params);
        params[2].1 = "9999".to_owned();
        assert!(!validator.validate(URL, &params, b"", &signature));
    }

    #[test]
    fn rejects_wrong_token() {
        let params = twilio_params();
        let signature = RequestValidator::new("other").compute_signature(URL, &params);
        assert!(!RequestValidator::new(TOKEN).validate(URL, &params, b"", &signature));
    }

    #[test]
    fn rejects_non_base64_signature() {
        let validator = RequestValidator::new(TOKEN);
        assert!(!validator.validate(URL, &twilio_params(), b"", "not base64 !!"));
    }

    #[test]
    fn accepts_signature_over_url_with_default_port() {
        let validator = RequestValidator::new(TOKEN);
        let params = twilio_params();
        let signature =
            validator.compute_signature("https://mycompany.com:443/myapp.php?foo=1&bar=2", &params);
        assert!(validator.validate(URL, &params, b"", &signature));
    }

    #[test]
    fn accepts_signature_over_url_without_port() {
        let validator = RequestValidator::new(TOKEN);
        let params = twilio_params();
        let signature = validator.compute_signature(URL, &params);
        assert!(validator.validate(
            "https://mycompany.com:443/myapp.php?foo=1&bar=2",
            &params,
            b"",
            &signature
        ));
    }

    #[test]
    fn body_hash_is_checked_for_json_deliveries() {
        let validator = RequestValidator::new(TOKEN);
        let body = br#"{"property": "value", "boolean": true}"#;
        let url = format!(
            "https://mycompany.com/myapp.php?{}={}",
            BODY_HASH_PARAM,
            compute_body_hash(body)
        );
        let signature = validator.compute_signature(&url, &[]);

        assert!(validator.validate(&url, &[], body, &signature));
        assert!(!validator.validate(&url, &[], b"{\"property\": \"other\"}", &signature));
    }

    #[test]
    fn port_helpers_round_trip_default_port() {
        assert_eq!(add_port("https://a.example/x"), "https://a.example:443/x");
        assert_eq!(add_port("https://a.example:8443/x"), "https://a.example:8443/x");
        assert_eq!(remove_port("https://a.example:443/x?y=1"), "https://a.example/x?y=1");
        assert_eq!(remove_port("https://a.example/x"), "https://a.example/x");
    }

    #[test]
    fn parse_form_decodes_plus_and_percent() {
        assert_eq!(
            parse_form("From=%2B1234&SpeechResult=hello+world&Empty="),
            vec![
                ("From".to_owned(), "+1234".to_owned()),
                ("SpeechResult".to_owned(), "hello world".to_owned()),
                ("Empty".to_owned(), String::new()),
            ]
        );
    }

    #[test]
    fn debug_does_not_leak_token() {
        let rendered = format!("{:?}", RequestValidator::new("s3cret"));
        assert!(!rendered.contains("s3cret"));
    }
}
