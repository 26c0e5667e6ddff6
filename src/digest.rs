//! RFC 2617 hash chain used to verify Digest credentials.
//!
//! All functions are pure. The `algorithm` directive of the credentials selects the hash
//! (any case); it defaults to MD5, which is the only one advertised in our challenges.
//! Values that are not recognized are treated as MD5.

use std::str::FromStr;

use crate::{Algorithm, Authorization, Error::*, HttpMethod, Qop, Result};

/// Request data needed to derive `HA2`
#[derive(Debug, Clone, Copy)]
pub struct DigestRequest<'a> {
    /// HTTP method used
    pub method: HttpMethod<'a>,
    /// Request-URI as sent on the request line
    pub uri: &'a str,
    /// Payload body, needed for auth-int
    pub body: Option<&'a [u8]>,
}

impl<'a> DigestRequest<'a> {
    pub fn new(method: HttpMethod<'a>, uri: &'a str) -> Self {
        Self {
            method,
            uri,
            body: None,
        }
    }

    pub fn with_body(mut self, body: &'a [u8]) -> Self {
        self.body = Some(body);
        self
    }
}

/// `H(data)`: lowercase hex MD5
pub fn h<T: AsRef<[u8]>>(data: T) -> String {
    Algorithm::default().hash(data.as_ref())
}

/// `HA1 = H(username:realm:password)`
pub fn ha1(realm: &str, username: &str, password: &str) -> String {
    ha1_with(Algorithm::default(), realm, username, password)
}

fn ha1_with(algo: Algorithm, realm: &str, username: &str, password: &str) -> String {
    algo.hash_str(&format!(
        "{name}:{realm}:{pw}",
        name = username,
        realm = realm,
        pw = password
    ))
}

fn qop_of(creds: &Authorization) -> Result<Option<Qop>> {
    creds.qop().map(Qop::from_str).transpose()
}

/// Unrecognized `algorithm` values fall back to MD5
fn algorithm_of(creds: &Authorization) -> Algorithm {
    creds
        .algorithm()
        .and_then(|a| Algorithm::from_str(a).ok())
        .unwrap_or_default()
}

fn required<'c>(creds: &'c Authorization, key: &'static str) -> Result<&'c str> {
    creds
        .get(key)
        .ok_or_else(|| MissingRequired(key, "digest credentials".into()))
}

/// `HA2`, depending on the credentials' `qop`:
///
/// - absent or `auth`: `H(method:uri)`
/// - `auth-int`: `H(method:uri:H(body))`, the body must be given
///
/// # Errors
/// `InvalidQop` for any other qop value, `MissingRequired` if auth-int is used without a body.
pub fn ha2(creds: &Authorization, request: &DigestRequest) -> Result<String> {
    ha2_with(algorithm_of(creds), qop_of(creds)?, request)
}

fn ha2_with(algo: Algorithm, qop: Option<Qop>, request: &DigestRequest) -> Result<String> {
    let a2 = match qop {
        None | Some(Qop::AUTH) => format!(
            "{method}:{uri}",
            method = request.method,
            uri = request.uri
        ),
        Some(Qop::AUTH_INT) => {
            let body = request
                .body
                .ok_or_else(|| MissingRequired("body", "auth-int request".into()))?;
            format!(
                "{method}:{uri}:{bodyhash}",
                method = request.method,
                uri = request.uri,
                bodyhash = algo.hash(body)
            )
        }
    };
    Ok(algo.hash_str(&a2))
}

/// Compute the `response` value the client should have sent
///
/// - qop absent: `H(HA1:nonce:HA2)`
/// - qop `auth` or `auth-int`: `H(HA1:nonce:nc:cnonce:qop:HA2)`
///
/// # Errors
/// `InvalidQop` for an unsupported qop value, `MissingRequired`
/// when `nonce` (and, with a qop, `nc`, `cnonce`) is not present.
pub fn response(creds: &Authorization, password: &str, request: &DigestRequest) -> Result<String> {
    let algo = algorithm_of(creds);
    let qop = qop_of(creds)?;

    let realm = creds.realm().unwrap_or_default();
    let username = creds.username().unwrap_or_default();
    let nonce = required(creds, "nonce")?;

    let mut ha1 = ha1_with(algo, realm, username, password);
    if algo.sess {
        ha1 = algo.hash_str(&format!(
            "{hash}:{nonce}:{cnonce}",
            hash = ha1,
            nonce = nonce,
            cnonce = required(creds, "cnonce")?
        ));
    }

    let ha2 = ha2_with(algo, qop, request)?;

    let tmp = match qop {
        None => format!("{ha1}:{nonce}:{ha2}", ha1 = ha1, nonce = nonce, ha2 = ha2),
        Some(q) => format!(
            "{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}",
            ha1 = ha1,
            nonce = nonce,
            nc = required(creds, "nc")?,
            cnonce = required(creds, "cnonce")?,
            qop = q,
            ha2 = ha2
        ),
    };
    Ok(algo.hash_str(&tmp))
}

/// Recompute the response and compare it with the one the client sent.
/// The comparison is exact; hex case is not normalized.
pub fn verify(creds: &Authorization, password: &str, request: &DigestRequest) -> Result<()> {
    let expected = response(creds, password, request)?;
    match creds.response() {
        Some(given) if given == expected => Ok(()),
        Some(_) => Err(ResponseMismatch),
        None => Err(MissingRequired("response", "digest credentials".into())),
    }
}
