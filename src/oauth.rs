//! OAuth 1.0 request signatures: URL and parameter normalization, the signature
//! base string, and the HMAC-SHA1 / PLAINTEXT signing methods.

use std::convert::TryFrom;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

use crate::utils::url_escape;
use crate::{Error::*, HttpMethod, Result};

/// Maximum age of `oauth_timestamp`, in seconds
pub const TIMESTAMP_THRESHOLD: u64 = 300;

/// Fields every signed OAuth request must carry
pub const REQUIRED_FIELDS: [&str; 5] = [
    "oauth_consumer_key",
    "oauth_nonce",
    "oauth_signature",
    "oauth_signature_method",
    "oauth_timestamp",
];

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| InvalidUrl(format!("{}: {}", url, e)))
}

/// Base string URI: scheme, host, non-default port and path. Query and fragment are dropped.
///
/// # Errors
/// `UnsupportedUrl` for anything but http and https.
pub fn normalize_url(url: &str) -> Result<String> {
    let parsed = parse_url(url)?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UnsupportedUrl(format!("{} ({})", url, other))),
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| InvalidUrl(format!("{}: no host", url)))?;

    // `port()` is None when the port is the scheme's default
    let mut normalized = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{}", port));
    }
    normalized.push_str(parsed.path());
    Ok(normalized)
}

/// Normalized request parameters (RFC 5849 section 3.4.1.3.2) taken from the query string.
///
/// Only the first value of a repeated key is used and `oauth_signature` is left out.
/// Pairs are sorted by name, then value, and joined as `k=v&k=v` with RFC 3986 escaping.
pub fn normalize_parameters(url: &str) -> Result<String> {
    let parsed = parse_url(url)?;

    let mut items: Vec<(String, String)> = vec![];
    for (k, v) in parsed.query_pairs() {
        if k == "oauth_signature" || items.iter().any(|(seen, _)| *seen == k) {
            continue;
        }
        items.push((k.into_owned(), v.into_owned()));
    }
    items.sort();

    Ok(items
        .iter()
        .map(|(k, v)| format!("{}={}", url_escape(k), url_escape(v)))
        .collect::<Vec<_>>()
        .join("&"))
}

/// Parse an `oauth_timestamp` value
pub fn parse_timestamp(timestamp: &str) -> Result<i64> {
    Ok(timestamp.trim().parse::<i64>()?)
}

/// Fail if the timestamp is more than `threshold` seconds older than `now`.
/// Timestamps from the future are accepted.
pub fn check_timestamp(timestamp: i64, now: i64, threshold: u64) -> Result<()> {
    let lapsed = now.saturating_sub(timestamp);
    if lapsed > i64::try_from(threshold).unwrap_or(i64::MAX) {
        return Err(StaleTimestamp {
            given: timestamp,
            now,
            threshold,
        });
    }
    Ok(())
}

/// The parts of a request that get signed
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureRequest {
    pub method: String,
    pub normalized_url: String,
    pub normalized_parameters: String,
}

impl SignatureRequest {
    pub fn new(method: &str, normalized_url: &str, normalized_parameters: &str) -> Self {
        Self {
            method: method.to_string(),
            normalized_url: normalized_url.to_string(),
            normalized_parameters: normalized_parameters.to_string(),
        }
    }

    /// Normalize the full request URL
    pub fn from_url(method: HttpMethod, url: &str) -> Result<Self> {
        Ok(Self {
            method: method.to_string(),
            normalized_url: normalize_url(url)?,
            normalized_parameters: normalize_parameters(url)?,
        })
    }
}

/// `escape(consumer_secret)&escape(token_secret)`, the `&` is kept even without a token
fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        url_escape(consumer_secret),
        token_secret.map(url_escape).unwrap_or_default()
    )
}

/// A way of signing requests
pub trait SignatureMethod: Sync {
    /// Value of `oauth_signature_method` selecting this method
    fn name(&self) -> &'static str;

    /// The key and the message to sign. The message is also handed back to clients
    /// whose signature did not match.
    fn signing_base(
        &self,
        request: &SignatureRequest,
        consumer_secret: &str,
        token_secret: Option<&str>,
    ) -> Result<(String, String)>;

    fn sign(
        &self,
        request: &SignatureRequest,
        consumer_secret: &str,
        token_secret: Option<&str>,
    ) -> Result<String>;

    /// Whether `signature` is the one this method produces for the request.
    /// Plain string comparison.
    fn check(
        &self,
        request: &SignatureRequest,
        consumer_secret: &str,
        token_secret: Option<&str>,
        signature: &str,
    ) -> Result<bool> {
        Ok(self.sign(request, consumer_secret, token_secret)? == signature)
    }
}

/// `HMAC-SHA1` over the signature base string
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha1;

impl SignatureMethod for HmacSha1 {
    fn name(&self) -> &'static str {
        "HMAC-SHA1"
    }

    fn signing_base(
        &self,
        request: &SignatureRequest,
        consumer_secret: &str,
        token_secret: Option<&str>,
    ) -> Result<(String, String)> {
        if request.normalized_url.is_empty() {
            return Err(MissingRequired("normalized_url", "signature request".into()));
        }
        if request.method.is_empty() {
            return Err(MissingRequired("method", "signature request".into()));
        }

        let raw = [
            url_escape(&request.method),
            url_escape(&request.normalized_url),
            url_escape(&request.normalized_parameters),
        ]
        .join("&");

        Ok((signing_key(consumer_secret, token_secret), raw))
    }

    fn sign(
        &self,
        request: &SignatureRequest,
        consumer_secret: &str,
        token_secret: Option<&str>,
    ) -> Result<String> {
        let (key, raw) = self.signing_base(request, consumer_secret, token_secret)?;

        let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
            .map_err(|e| BadEncoding(e.to_string()))?;
        mac.update(raw.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// `PLAINTEXT`: the signing key itself is the signature
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl SignatureMethod for Plaintext {
    fn name(&self) -> &'static str {
        "PLAINTEXT"
    }

    fn signing_base(
        &self,
        _request: &SignatureRequest,
        consumer_secret: &str,
        token_secret: Option<&str>,
    ) -> Result<(String, String)> {
        let sig = signing_key(consumer_secret, token_secret);
        Ok((sig.clone(), sig))
    }

    fn sign(
        &self,
        request: &SignatureRequest,
        consumer_secret: &str,
        token_secret: Option<&str>,
    ) -> Result<String> {
        let (_, raw) = self.signing_base(request, consumer_secret, token_secret)?;
        Ok(raw)
    }
}

static SIGNATURE_METHODS: &[&dyn SignatureMethod] = &[&HmacSha1, &Plaintext];

/// Look up a signing method by its `oauth_signature_method` name
pub fn signature_method(name: &str) -> Result<&'static dyn SignatureMethod> {
    SIGNATURE_METHODS
        .iter()
        .copied()
        .find(|m| m.name() == name)
        .ok_or_else(|| UnknownSignatureMethod(name.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn photos_request() -> SignatureRequest {
        SignatureRequest::new(
            "GET",
            "http://photos.example.net/photos",
            "file=vacation.jpg&size=original",
        )
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("http://example.com:80/path?q=1").unwrap(),
            "http://example.com/path"
        );
        assert_eq!(
            normalize_url("https://example.com:443/a/b#frag").unwrap(),
            "https://example.com/a/b"
        );
        assert_eq!(
            normalize_url("http://example.com:8080/r?x=y").unwrap(),
            "http://example.com:8080/r"
        );
        assert_eq!(
            normalize_url("https://example.com:80/").unwrap(),
            "https://example.com:80/"
        );
        // empty paths become "/" and ";params" stay in the path
        assert_eq!(normalize_url("http://example.com").unwrap(), "http://example.com/");
        assert_eq!(
            normalize_url("http://example.com/a;v=1?q").unwrap(),
            "http://example.com/a;v=1"
        );
        assert!(matches!(
            normalize_url("ftp://example.com/file"),
            Err(Error::UnsupportedUrl(_))
        ));
        assert!(matches!(
            normalize_url("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_normalize_parameters() {
        assert_eq!(
            normalize_parameters("http://x?b=2&a=1&oauth_signature=zz").unwrap(),
            "a=1&b=2"
        );
        assert_eq!(normalize_parameters("http://x/").unwrap(), "");
        // first value wins, blank values are kept
        assert_eq!(
            normalize_parameters("http://x/?a=2&a=1&c=").unwrap(),
            "a=2&c="
        );
        // space and tilde follow RFC 3986, not form encoding
        assert_eq!(
            normalize_parameters("http://x/?name=two+words&t=%7Euser&s=a%2Fb").unwrap(),
            "name=two%20words&s=a%2Fb&t=~user"
        );
    }

    #[test]
    fn test_hmac_sha1_reference() {
        let req = photos_request();

        let (key, raw) = HmacSha1.signing_base(&req, "kd94hf93k423kf44", None).unwrap();
        assert_eq!(key, "kd94hf93k423kf44&");
        assert_eq!(
            raw,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26size%3Doriginal"
        );
        assert_eq!(
            HmacSha1.sign(&req, "kd94hf93k423kf44", None).unwrap(),
            "u5kjwByda+R2H5ddHCrfimNUXK0="
        );
        assert_eq!(
            HmacSha1
                .sign(&req, "kd94hf93k423kf44", Some("pfkkdhi9sl3r4s00"))
                .unwrap(),
            "bCj30UOPws05m3j9J8GJZsd6zHU="
        );
        assert!(HmacSha1
            .check(&req, "kd94hf93k423kf44", None, "u5kjwByda+R2H5ddHCrfimNUXK0=")
            .unwrap());
        assert!(!HmacSha1
            .check(&req, "kd94hf93k423kf44", None, "u5kjwByda+R2H5ddHCrfimNUXK1=")
            .unwrap());
    }

    #[test]
    fn test_hmac_sha1_needs_url() {
        let req = SignatureRequest::new("GET", "", "");
        assert!(matches!(
            HmacSha1.sign(&req, "secret", None),
            Err(Error::MissingRequired("normalized_url", _))
        ));
    }

    #[test]
    fn test_plaintext() {
        let req = photos_request();
        assert_eq!(
            Plaintext.signing_base(&req, "kd94hf93k423kf44", None).unwrap(),
            ("kd94hf93k423kf44&".to_string(), "kd94hf93k423kf44&".to_string())
        );
        assert_eq!(
            Plaintext.sign(&req, "a&b", Some("c d")).unwrap(),
            "a%26b&c%20d"
        );
        assert!(Plaintext.check(&req, "cs", Some(""), "cs&").unwrap());
    }

    #[test]
    fn test_signature_method_registry() {
        assert_eq!(signature_method("HMAC-SHA1").unwrap().name(), "HMAC-SHA1");
        assert_eq!(signature_method("PLAINTEXT").unwrap().name(), "PLAINTEXT");
        assert_eq!(
            signature_method("RSA-SHA1").err(),
            Some(Error::UnknownSignatureMethod("RSA-SHA1".into()))
        );
    }

    #[test]
    fn test_from_url() {
        let req = SignatureRequest::from_url(
            HttpMethod::GET,
            "http://photos.example.net:80/photos?size=original&file=vacation.jpg&oauth_signature=x",
        )
        .unwrap();
        assert_eq!(req, photos_request());
    }

    #[test]
    fn test_check_timestamp() {
        assert_eq!(check_timestamp(1000, 1300, TIMESTAMP_THRESHOLD), Ok(()));
        assert_eq!(
            check_timestamp(1000, 1301, TIMESTAMP_THRESHOLD),
            Err(Error::StaleTimestamp {
                given: 1000,
                now: 1301,
                threshold: 300
            })
        );
        // future timestamps are not rejected
        assert_eq!(check_timestamp(5000, 1000, TIMESTAMP_THRESHOLD), Ok(()));
        // thresholds past i64::MAX do not wrap around
        assert_eq!(check_timestamp(0, 1_700_000_000, u64::MAX), Ok(()));

        assert_eq!(parse_timestamp(" 1318622958 ").unwrap(), 1318622958);
        assert_eq!(parse_timestamp("soon"), Err(Error::NumParseError));
    }
}
