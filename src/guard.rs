//! Challenge / verification flow for protected routes.
//!
//! A guard looks at the `Authorization` header of a request and answers with an
//! [`Outcome`]: a challenge (401 + `WWW-Authenticate`), an accepted payload, or a
//! rejection. Nothing in here returns an error to the caller.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use url::form_urlencoded;
use url::Url;

use crate::digest::{self, DigestRequest};
use crate::oauth::{
    check_timestamp, parse_timestamp, signature_method, Plaintext, SignatureMethod,
    SignatureRequest, REQUIRED_FIELDS,
};
use crate::utils::url_unescape;
use crate::{
    AuthConfig, Authorization, Error, Error::*, HttpMethod, Params, Qop, Result, Scheme,
    WwwAuthenticate,
};

pub const WWW_AUTHENTICATE: &str = "WWW-Authenticate";
pub const PROXY_AUTHENTICATE: &str = "Proxy-Authenticate";

/// Status codes produced by the guards
pub mod status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const PROXY_AUTHENTICATION_REQUIRED: u16 = 407;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

//region RequestContext

/// What the guards need to know about the request being served
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    /// HTTP method used
    pub method: HttpMethod<'a>,
    /// Full request URL, including the query
    pub url: &'a str,
    /// Request target as sent on the request line (path and query)
    pub uri: String,
    /// Payload body
    pub body: &'a [u8],
    /// Client address, mixed into Digest nonces
    pub remote_ip: &'a str,
    /// Raw `Authorization` header value, if any
    pub authorization: Option<&'a str>,
    /// Wall-clock time, seconds since the Unix epoch
    pub now: i64,
}

impl<'a> RequestContext<'a> {
    /// Context for a request without body or credentials, timestamped now
    pub fn new(method: HttpMethod<'a>, url: &'a str) -> Self {
        Self {
            method,
            url,
            uri: request_target(url),
            body: &[],
            remote_ip: "127.0.0.1",
            authorization: None,
            now: unix_now(),
        }
    }

    pub fn with_authorization(mut self, value: &'a str) -> Self {
        self.authorization = Some(value);
        self
    }

    pub fn with_body(mut self, body: &'a [u8]) -> Self {
        self.body = body;
        self
    }

    pub fn with_remote_ip(mut self, ip: &'a str) -> Self {
        self.remote_ip = ip;
        self
    }

    /// Override the request target derived from the URL, e.g. with the raw request line value
    pub fn with_uri(mut self, uri: &str) -> Self {
        self.uri = uri.to_string();
        self
    }

    /// Pin the clock
    pub fn at(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    /// First value of a query argument
    pub fn query_arg(&self, key: &str) -> Option<String> {
        let url = Url::parse(self.url).ok()?;
        let value = url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned());
        value
    }
}

/// Path and query exactly as written in `url`, fragment dropped. No re-encoding and no
/// dot-segment removal, Digest clients hash the target byte for byte.
fn request_target(url: &str) -> String {
    let url = url.split('#').next().unwrap_or_default();
    let target = match url.find("://") {
        Some(n) => {
            let authority_and_rest = &url[n + 3..];
            match authority_and_rest.find(|c: char| c == '/' || c == '?') {
                Some(m) => &authority_and_rest[m..],
                None => "",
            }
        }
        None => url,
    };
    match target.chars().next() {
        None => "/".to_string(),
        Some('?') => format!("/{}", target),
        Some(_) => target.to_string(),
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

//endregion

//region Outcome

/// Response payload
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Text(String),
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(String),
}

impl Body {
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Empty => None,
            Body::Text(_) => Some("text/plain; charset=UTF-8"),
            Body::Json(_) => Some("application/json"),
            Body::Form(_) => Some("application/x-www-form-urlencoded"),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Body::Empty => vec![],
            Body::Text(s) | Body::Form(s) => s.as_bytes().to_vec(),
            Body::Json(v) => serde_json::to_vec(v).unwrap_or_default(),
        }
    }
}

/// Where the exchange ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No usable credentials; a challenge was sent
    ChallengeIssued,
    Accepted,
    Rejected,
}

/// Status, headers and body the surrounding handler should send back
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Body,
    pub state: AuthState,
}

impl Outcome {
    /// 401 carrying the challenge, no body
    pub fn challenge(challenge: &WwwAuthenticate) -> Self {
        Self {
            status: status::UNAUTHORIZED,
            headers: vec![(WWW_AUTHENTICATE, challenge.to_header())],
            body: Body::Empty,
            state: AuthState::ChallengeIssued,
        }
    }

    pub fn accepted(body: Body) -> Self {
        Self {
            status: status::OK,
            headers: vec![],
            body,
            state: AuthState::Accepted,
        }
    }

    pub fn rejected(status: u16, body: Body) -> Self {
        Self {
            status,
            headers: vec![],
            body,
            state: AuthState::Rejected,
        }
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Accepted
    }

    #[cfg(feature = "http")]
    pub fn into_response(self) -> http::Result<http::Response<Vec<u8>>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(ct) = self.body.content_type() {
            builder = builder.header(http::header::CONTENT_TYPE, ct);
        }
        builder.body(self.body.to_bytes())
    }
}

/// Extra header some simulated status codes come with:
/// `WWW-Authenticate` for 401, `Proxy-Authenticate` for 407.
pub fn challenge_for_status(status: u16, realm: &str) -> Option<(&'static str, String)> {
    let name = match status {
        status::UNAUTHORIZED => WWW_AUTHENTICATE,
        status::PROXY_AUTHENTICATION_REQUIRED => PROXY_AUTHENTICATE,
        _ => return None,
    };
    Some((
        name,
        WwwAuthenticate::with_realm(Scheme::Basic, realm).to_header(),
    ))
}

//endregion

//region username / password schemes

/// Challenge-response skeleton shared by Basic and Digest.
///
/// Implementors provide the challenge and the credential check; a failed check
/// re-issues the challenge unless [`reject`](#method.reject) is overridden.
pub trait PasswordAuth {
    /// Scheme the `Authorization` header must use
    fn scheme(&self) -> Scheme;

    fn challenge(&self, ctx: &RequestContext) -> WwwAuthenticate;

    fn verify(
        &self,
        ctx: &RequestContext,
        credentials: &Authorization,
        username: &str,
        password: &str,
    ) -> Result<()>;

    fn request_auth(&self, ctx: &RequestContext) -> Outcome {
        log::debug!("{} challenge for {}", self.scheme(), ctx.uri);
        Outcome::challenge(&self.challenge(ctx))
    }

    fn reject(&self, ctx: &RequestContext, error: Error) -> Outcome {
        log::warn!("{} credentials rejected for {}: {}", self.scheme(), ctx.uri, error);
        self.request_auth(ctx)
    }

    /// Run the whole exchange against the expected username and password
    fn authenticate(&self, ctx: &RequestContext, username: &str, password: &str) -> Outcome {
        let header = match ctx.authorization {
            Some(header) => header,
            None => return self.request_auth(ctx),
        };

        let credentials = match Authorization::parse(header) {
            Ok(c) if c.scheme() == self.scheme() => c,
            Ok(c) => {
                log::debug!("expected {} credentials, got {}", self.scheme(), c.scheme());
                return self.request_auth(ctx);
            }
            Err(e) => {
                log::debug!("unusable authorization header: {}", e);
                return self.request_auth(ctx);
            }
        };

        match self.verify(ctx, &credentials, username, password) {
            Ok(()) => {
                log::debug!("{} credentials accepted for {}", self.scheme(), username);
                Outcome::accepted(Body::Json(json!({
                    "authenticated": true,
                    "password": password,
                    "username": username,
                    "auth-type": self.scheme().to_string().to_lowercase(),
                })))
            }
            Err(e) => self.reject(ctx, e),
        }
    }
}

/// HTTP Basic access
#[derive(Debug, Clone, Default)]
pub struct BasicAuth {
    config: AuthConfig,
}

impl BasicAuth {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }
}

impl PasswordAuth for BasicAuth {
    fn scheme(&self) -> Scheme {
        Scheme::Basic
    }

    fn challenge(&self, _ctx: &RequestContext) -> WwwAuthenticate {
        WwwAuthenticate::with_realm(Scheme::Basic, &self.config.realm)
    }

    fn verify(
        &self,
        _ctx: &RequestContext,
        credentials: &Authorization,
        username: &str,
        password: &str,
    ) -> Result<()> {
        if credentials.username() == Some(username) && credentials.password() == Some(password) {
            Ok(())
        } else {
            Err(CredentialsMismatch)
        }
    }
}

/// HTTP Digest access (RFC 2617), qop `auth` and `auth-int`
#[derive(Debug, Clone, Default)]
pub struct DigestAuth {
    config: AuthConfig,
    qop: Option<Qop>,
}

impl DigestAuth {
    /// `qop` is the route's pinned qop; anything but `auth` / `auth-int` offers
    /// the configured list instead.
    pub fn new(config: AuthConfig, qop: &str) -> Self {
        Self {
            config,
            qop: Qop::from_str(qop).ok(),
        }
    }
}

/// Random hex string, only used for uniqueness
fn random_hex() -> String {
    let bytes: [u8; 10] = rand::thread_rng().gen();
    hex::encode(bytes)
}

impl PasswordAuth for DigestAuth {
    fn scheme(&self) -> Scheme {
        Scheme::Digest
    }

    /// Fresh nonce `H(client-ip:timestamp:random)` and opaque on every call; neither is stored
    fn challenge(&self, ctx: &RequestContext) -> WwwAuthenticate {
        let nonce = digest::h(format!("{}:{}:{}", ctx.remote_ip, ctx.now, random_hex()));
        let opaque = digest::h(random_hex());
        let qop = match self.qop {
            Some(q) => q.to_string(),
            None => self.config.digest_qop.clone(),
        };

        let mut params = Params::new();
        params.insert("realm", Some(self.config.realm.as_str()));
        params.insert("nonce", Some(nonce));
        params.insert("qop", Some(qop));
        params.insert("opaque", Some(opaque));
        WwwAuthenticate::new(Scheme::Digest, params)
    }

    fn verify(
        &self,
        ctx: &RequestContext,
        credentials: &Authorization,
        _username: &str,
        password: &str,
    ) -> Result<()> {
        let request = DigestRequest::new(ctx.method, &ctx.uri).with_body(ctx.body);
        digest::verify(credentials, password, &request)
    }

    /// A well-formed but wrong response is final: 403 without a body
    fn reject(&self, ctx: &RequestContext, error: Error) -> Outcome {
        if error.is_malformed() {
            log::debug!("incomplete digest credentials: {}", error);
            return self.request_auth(ctx);
        }
        log::warn!("digest credentials rejected for {}: {}", ctx.uri, error);
        Outcome::rejected(status::FORBIDDEN, Body::Empty)
    }
}

//endregion

//region OAuth

/// Token key and secret handed out by the OAuth endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub key: &'a str,
    pub secret: &'a str,
}

impl<'a> Token<'a> {
    pub fn new(key: &'a str, secret: &'a str) -> Self {
        Self { key, secret }
    }

    fn to_form(self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("oauth_token", self.key)
            .append_pair("oauth_token_secret", self.secret)
            .finish()
    }
}

/// OAuth 1.0 signed request checks and the three-legged token endpoints
#[derive(Debug, Clone, Default)]
pub struct OAuthGuard {
    config: AuthConfig,
}

impl OAuthGuard {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn challenge(&self) -> WwwAuthenticate {
        WwwAuthenticate::with_realm(Scheme::OAuth, &self.config.realm)
    }

    pub fn request_auth(&self) -> Outcome {
        log::debug!("OAuth challenge");
        Outcome::challenge(&self.challenge())
    }

    /// Collect the `oauth_*` fields from the `Authorization` header, or from the query
    /// string when there is no header. Header values are percent-decoded.
    ///
    /// # Errors
    /// If the header is not an OAuth one, or a required field is missing.
    pub fn credentials(&self, ctx: &RequestContext) -> Result<Authorization> {
        let credentials = match ctx.authorization {
            Some(header) => {
                let parsed = Authorization::parse(header)?;
                if parsed.scheme() != Scheme::OAuth {
                    return Err(UnsupportedScheme(parsed.scheme().to_string()));
                }
                let mut params = Params::new();
                for (k, v) in parsed.params().iter() {
                    params.insert(k, v.map(url_unescape).transpose()?);
                }
                Authorization::new(Scheme::OAuth, params)
            }
            None => {
                let params = REQUIRED_FIELDS
                    .iter()
                    .filter_map(|k| ctx.query_arg(k).map(|v| (*k, v)))
                    .collect();
                Authorization::new(Scheme::OAuth, params)
            }
        };

        for k in REQUIRED_FIELDS.iter() {
            if credentials.get(k).is_none() {
                return Err(MissingRequired(*k, "OAuth credentials".into()));
            }
        }
        Ok(credentials)
    }

    /// Check credentials, timestamp and signature of a request.
    ///
    /// Returns the credentials on success, otherwise the response to send.
    pub fn verify(
        &self,
        ctx: &RequestContext,
        consumer_secret: &str,
        token_secret: Option<&str>,
    ) -> std::result::Result<Authorization, Outcome> {
        let credentials = match self.credentials(ctx) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("unusable OAuth credentials: {}", e);
                return Err(self.request_auth());
            }
        };

        let timestamp = match parse_timestamp(credentials.get("oauth_timestamp").unwrap_or_default()) {
            Ok(ts) => ts,
            Err(e) => {
                log::debug!("bad oauth_timestamp: {}", e);
                return Err(self.request_auth());
            }
        };
        if let Err(e) = check_timestamp(timestamp, ctx.now, self.config.timestamp_threshold) {
            log::warn!("{}", e);
            return Err(Outcome::rejected(status::UNAUTHORIZED, Body::Text(e.to_string())));
        }

        let name = credentials.get("oauth_signature_method").unwrap_or_default();
        let method: &dyn SignatureMethod = match signature_method(name) {
            Ok(m) => m,
            Err(e) if self.config.plaintext_fallback => {
                log::warn!("{}, checking as PLAINTEXT", e);
                &Plaintext
            }
            Err(e) => {
                log::warn!("{}", e);
                return Err(Outcome::rejected(status::NOT_FOUND, Body::Empty));
            }
        };

        let request = match SignatureRequest::from_url(ctx.method, ctx.url) {
            Ok(r) => r,
            Err(e) => return Err(bad_request(e)),
        };

        let signature = credentials.get("oauth_signature").unwrap_or_default();
        match method.check(&request, consumer_secret, token_secret, signature) {
            Ok(true) => {
                log::debug!("{} signature accepted for {}", method.name(), ctx.uri);
                Ok(credentials)
            }
            Ok(false) => {
                log::warn!("{} ({}) for {}", SignatureMismatch, method.name(), ctx.uri);
                Err(self
                    .mismatch(method, &request, consumer_secret, token_secret)
                    .unwrap_or_else(bad_request))
            }
            Err(e) => Err(bad_request(e)),
        }
    }

    /// 403 with the expected base string and signature, to help debugging clients
    fn mismatch(
        &self,
        method: &dyn SignatureMethod,
        request: &SignatureRequest,
        consumer_secret: &str,
        token_secret: Option<&str>,
    ) -> Result<Outcome> {
        let (_, signature_string) = method.signing_base(request, consumer_secret, token_secret)?;
        let signature_hash = method.sign(request, consumer_secret, token_secret)?;
        let tagline = self
            .config
            .taglines
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default();

        Ok(Outcome::rejected(
            status::FORBIDDEN,
            Body::Json(json!({
                "success": false,
                "tagline": tagline,
                "signature_string": signature_string,
                "signature_hash": signature_hash,
            })),
        ))
    }

    fn check_version(&self, version: &str) -> std::result::Result<(), Outcome> {
        if self.config.oauth_versions.iter().any(|v| v == version) {
            Ok(())
        } else {
            log::debug!("unsupported OAuth version {}", version);
            Err(Outcome::rejected(status::BAD_REQUEST, Body::Empty))
        }
    }

    /// Temporary credentials endpoint: signed with the consumer secret only
    pub fn request_token(
        &self,
        ctx: &RequestContext,
        version: &str,
        consumer_secret: &str,
        token: Token,
    ) -> Outcome {
        if let Err(outcome) = self.check_version(version) {
            return outcome;
        }
        match self.verify(ctx, consumer_secret, None) {
            Ok(_) => Outcome::accepted(Body::Form(token.to_form())),
            Err(outcome) => outcome,
        }
    }

    /// Resource owner authorization: hands the verifier `pin` back
    pub fn authorize(&self, ctx: &RequestContext, pin: &str) -> Outcome {
        match ctx.query_arg("oauth_token") {
            Some(_) => Outcome::accepted(Body::Json(json!({ "verifier": pin }))),
            None => Outcome::rejected(
                status::INTERNAL_SERVER_ERROR,
                Body::Text("oauth token required".into()),
            ),
        }
    }

    /// Token credentials endpoint: signed with the consumer and temporary token secrets
    pub fn access_token(
        &self,
        ctx: &RequestContext,
        version: &str,
        consumer_secret: &str,
        tmp_token_secret: &str,
        token: Token,
    ) -> Outcome {
        if let Err(outcome) = self.check_version(version) {
            return outcome;
        }
        match self.verify(ctx, consumer_secret, Some(tmp_token_secret)) {
            Ok(_) => Outcome::accepted(Body::Form(token.to_form())),
            Err(outcome) => outcome,
        }
    }

    /// Protected resource: signed with the consumer and token secrets
    pub fn protected_resource(
        &self,
        ctx: &RequestContext,
        version: &str,
        consumer_secret: &str,
        token_secret: &str,
    ) -> Outcome {
        if let Err(outcome) = self.check_version(version) {
            return outcome;
        }
        match self.verify(ctx, consumer_secret, Some(token_secret)) {
            Ok(_) => Outcome::accepted(Body::Json(json!({
                "success": true,
                "url": ctx.url,
                "method": ctx.method.to_string(),
            }))),
            Err(outcome) => outcome,
        }
    }
}

fn bad_request(error: Error) -> Outcome {
    log::warn!("{}", error);
    Outcome::rejected(status::BAD_REQUEST, Body::Text(error.to_string()))
}

//endregion
