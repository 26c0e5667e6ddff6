//! Server-side HTTP authentication for a request-inspection test service.
//!
//! Three schemes are covered: Basic, Digest as specified by IETF RFCs 2069 and 2617,
//! and OAuth 1.0 signed requests (HMAC-SHA1 and PLAINTEXT). The crate holds no
//! I/O; callers hand a [`RequestContext`] to a guard and send back the [`Outcome`].
//!
//! # Examples
//!
//! Basic usage:
//!
//! ```
//! use httphq_auth::{AuthConfig, BasicAuth, PasswordAuth, RequestContext, HttpMethod};
//!
//! let guard = BasicAuth::new(AuthConfig::default());
//!
//! // No credentials yet: the client gets a challenge
//! let ctx = RequestContext::new(HttpMethod::GET, "http://localhost/basic-auth/user/passwd");
//! let outcome = guard.authenticate(&ctx, "user", "passwd");
//! assert_eq!(outcome.status, 401);
//! assert_eq!(outcome.header("WWW-Authenticate"), Some(r#"Basic realm="Fake Realm""#));
//!
//! // Second try with the credentials
//! let ctx = ctx.with_authorization("Basic dXNlcjpwYXNzd2Q=");
//! assert!(guard.authenticate(&ctx, "user", "passwd").is_authenticated());
//! ```
//!
//! Headers can also be handled on their own:
//!
//! ```
//! let prompt = httphq_auth::parse(r#"Digest realm="Fake Realm", nonce="abc", qop="auth,auth-int""#).unwrap();
//! assert_eq!(prompt.realm(), Some("Fake Realm"));
//! assert_eq!(prompt.qop(), Some("auth,auth-int"));
//! ```

mod config;
pub mod digest;
mod enums;
mod error;
mod guard;
mod header;
pub mod oauth;
mod utils;

pub use error::{Error, Result};

pub use crate::config::AuthConfig;
pub use crate::enums::*;
pub use crate::guard::{
    challenge_for_status, status, AuthState, BasicAuth, Body, DigestAuth, OAuthGuard, Outcome,
    PasswordAuth, RequestContext, Token, PROXY_AUTHENTICATE, WWW_AUTHENTICATE,
};
pub use crate::header::{parse_dict_header, parse_http_list, Authorization, Params, WwwAuthenticate};

/// Parse the WWW-Authenticate header value.
/// It's just a convenience method to call [`WwwAuthenticate::parse()`](struct.WwwAuthenticate.html#method.parse).
pub fn parse(www_authenticate: &str) -> Result<WwwAuthenticate> {
    WwwAuthenticate::parse(www_authenticate)
}

#[test]
fn test_challenge_respond() {
    let guard = DigestAuth::new(AuthConfig::default(), "auth");
    let url = "http://localhost/digest-auth/auth/Mufasa/Circle%20Of%20Life";
    let ctx = RequestContext::new(HttpMethod::GET, url).at(1_700_000_000);

    let challenge = guard.request_auth(&ctx);
    let prompt = crate::parse(challenge.header(WWW_AUTHENTICATE).unwrap()).unwrap();

    // answer the challenge the way a client would
    let mut params = Params::new();
    params.insert("username", Some("Mufasa"));
    params.insert("realm", prompt.realm());
    params.insert("nonce", prompt.nonce());
    params.insert("uri", Some(ctx.uri.as_str()));
    params.insert("qop", Some("auth"));
    params.insert("nc", Some("00000001"));
    params.insert("cnonce", Some("f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ"));
    params.insert("opaque", prompt.opaque());
    let answer = Authorization::new(Scheme::Digest, params);

    let request = digest::DigestRequest::new(ctx.method, &ctx.uri);
    let response = digest::response(&answer, "Circle Of Life", &request).unwrap();
    let header = answer.with_param("response", &response).to_header();

    let outcome = guard.authenticate(&ctx.clone().with_authorization(&header), "Mufasa", "Circle Of Life");
    assert_eq!(outcome.status, 200);
    assert!(outcome.is_authenticated());
}
