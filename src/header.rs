//! Conversion between raw `Authorization` / `WWW-Authenticate` header values
//! and structured credential records.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::utils::QuoteForDigest;
use crate::{Error, Error::*, Result, Scheme};

/// Fields that must be present in a Digest `Authorization` header for `qop=auth`
/// (or when `qop` is absent)
const DIGEST_AUTH_REQUIRED: &[&str] = &["username", "realm", "nonce", "uri", "response", "opaque"];

/// Additional fields required when `qop=auth-int`
const DIGEST_AUTH_INT_REQUIRED: &[&str] = &["qop", "nc", "cnonce"];

//region Params

/// Ordered parameter list of a credential record.
///
/// Keys keep the position of their first insertion; inserting an existing key
/// replaces its value in place. Bare tokens (`stale`, `auth-param` without a value)
/// are stored with a `None` value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Option<String>)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert<K, V>(&mut self, key: K, value: Option<V>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        let value = value.map(Into::into);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Value of a key. Bare tokens yield `None` just like absent keys, use
    /// [`contains_key`](#method.contains_key) to tell them apart.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail with the first key of `required` that is missing
    fn require(&self, required: &[&'static str], ctx: &str) -> Result<()> {
        match required.iter().find(|k| !self.contains_key(k)) {
            Some(k) => Err(MissingRequired(*k, ctx.to_string())),
            None => Ok(()),
        }
    }

    fn write_to(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (n, (k, v)) in self.entries.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            match v {
                Some(v) => write!(f, "{}=\"{}\"", k, v.quote_for_digest())?,
                None => f.write_str(k)?,
            }
        }
        Ok(())
    }
}

impl<K, V> std::iter::FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, Some(v));
        }
        params
    }
}

//endregion

//region list parsing

/// Split a comma-separated header list (RFC 2616 `#rule`), honoring quoted strings.
///
/// Backslash escapes inside quotes are resolved; the quotes themselves are kept so the
/// caller can tell quoted values from tokens. Empty elements are dropped.
pub fn parse_http_list(input: &str) -> Vec<String> {
    let mut items = vec![];
    let mut part = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            part.push(c);
            escaped = false;
            continue;
        }
        if quoted {
            match c {
                '\\' => {
                    escaped = true;
                    continue;
                }
                '"' => quoted = false,
                _ => {}
            }
            part.push(c);
            continue;
        }
        match c {
            ',' => {
                items.push(std::mem::take(&mut part));
                continue;
            }
            '"' => quoted = true,
            _ => {}
        }
        part.push(c);
    }
    items.push(part);

    items
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parse `key=value` / `key="quoted value"` pairs. A bare token maps to `None`.
pub fn parse_dict_header(input: &str) -> Params {
    let mut params = Params::new();
    for item in parse_http_list(input) {
        match item.find('=') {
            None => params.insert::<_, String>(item, None),
            Some(eq) => {
                let name = item[..eq].trim();
                let mut value = item[eq + 1..].trim();
                if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                    value = &value[1..value.len() - 1];
                }
                params.insert(name, Some(value));
            }
        }
    }
    params
}

/// Split off the scheme word; the remainder is the (possibly empty) credentials part
fn split_scheme(header: &str) -> Result<(Scheme, &str)> {
    let header = header.trim();
    if header.is_empty() {
        return Err(MalformedHeader("empty header".into()));
    }
    let (word, rest) = match header.find(char::is_whitespace) {
        Some(n) => (&header[..n], header[n..].trim_start()),
        None => (header, ""),
    };
    Ok((Scheme::from_str(word)?, rest))
}

//endregion

//region Authorization

/// `Authorization` header sent by a client
#[derive(Debug, Clone, PartialEq)]
pub struct Authorization {
    scheme: Scheme,
    params: Params,
}

impl Authorization {
    pub fn new(scheme: Scheme, params: Params) -> Self {
        Self { scheme, params }
    }

    /// Build from a scheme name, which must be one of Basic, Digest or OAuth (any case)
    pub fn from_parts(scheme: &str, params: Params) -> Result<Self> {
        Ok(Self::new(Scheme::from_str(scheme)?, params))
    }

    /// Basic credentials
    pub fn basic(username: &str, password: &str) -> Self {
        Self::new(
            Scheme::Basic,
            vec![("username", username), ("password", password)]
                .into_iter()
                .collect(),
        )
    }

    /// Construct from the `Authorization` header string
    ///
    /// # Errors
    /// If the scheme is not supported, the Basic payload does not decode, or a Digest header
    /// lacks one of the fields its `qop` requires.
    pub fn parse(header: &str) -> Result<Self> {
        let (scheme, rest) = split_scheme(header)?;
        if rest.is_empty() {
            return Err(MalformedHeader(header.trim().to_string()));
        }

        match scheme {
            Scheme::Basic => {
                let decoded = STANDARD
                    .decode(rest.trim())
                    .map_err(|e| BadEncoding(format!("Basic credentials: {}", e)))?;
                let decoded =
                    String::from_utf8(decoded).map_err(|e| BadEncoding(e.to_string()))?;
                let (username, password) = match decoded.find(':') {
                    Some(n) => (&decoded[..n], &decoded[n + 1..]),
                    None => return Err(MalformedHeader("Basic credentials without ':'".into())),
                };
                Ok(Self::basic(username, password))
            }
            Scheme::Digest => {
                let params = parse_dict_header(rest);
                match params.get("qop") {
                    None | Some("auth") => params.require(DIGEST_AUTH_REQUIRED, header)?,
                    Some("auth-int") => {
                        params.require(DIGEST_AUTH_REQUIRED, header)?;
                        params.require(DIGEST_AUTH_INT_REQUIRED, header)?;
                    }
                    Some(other) => return Err(InvalidQop(other.into())),
                }
                Ok(Self::new(scheme, params))
            }
            Scheme::OAuth => Ok(Self::new(scheme, parse_dict_header(rest))),
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Rebuild with one more (or a replaced) parameter
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key, Some(value));
        self
    }

    pub fn realm(&self) -> Option<&str> {
        self.get("realm")
    }

    pub fn nonce(&self) -> Option<&str> {
        self.get("nonce")
    }

    pub fn opaque(&self) -> Option<&str> {
        self.get("opaque")
    }

    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }

    /// Only set for Basic credentials
    pub fn password(&self) -> Option<&str> {
        self.get("password")
    }

    pub fn uri(&self) -> Option<&str> {
        self.get("uri")
    }

    pub fn qop(&self) -> Option<&str> {
        self.get("qop")
    }

    pub fn cnonce(&self) -> Option<&str> {
        self.get("cnonce")
    }

    pub fn nc(&self) -> Option<&str> {
        self.get("nc")
    }

    pub fn response(&self) -> Option<&str> {
        self.get("response")
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.get("algorithm")
    }

    /// Produce a header string (also accessible through the Display trait)
    pub fn to_header(&self) -> String {
        self.to_string()
    }
}

impl Display for Authorization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.scheme)?;
        match (self.scheme, self.username(), self.password()) {
            (Scheme::Basic, Some(user), Some(pw)) => {
                f.write_str(&STANDARD.encode(format!("{}:{}", user, pw)))
            }
            _ => self.params.write_to(f),
        }
    }
}

impl FromStr for Authorization {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

//endregion

//region WwwAuthenticate

/// `WWW-Authenticate` (or `Proxy-Authenticate`) challenge issued by a server
#[derive(Debug, Clone, PartialEq)]
pub struct WwwAuthenticate {
    scheme: Scheme,
    params: Params,
}

impl WwwAuthenticate {
    pub fn new(scheme: Scheme, params: Params) -> Self {
        Self { scheme, params }
    }

    pub fn from_parts(scheme: &str, params: Params) -> Result<Self> {
        Ok(Self::new(Scheme::from_str(scheme)?, params))
    }

    /// Challenge carrying only a realm, as used for Basic and OAuth
    pub fn with_realm(scheme: Scheme, realm: &str) -> Self {
        Self::new(scheme, vec![("realm", realm)].into_iter().collect())
    }

    /// Construct from the `WWW-Authenticate` header string. No fields are required.
    pub fn parse(header: &str) -> Result<Self> {
        let (scheme, rest) = split_scheme(header)?;
        Ok(Self::new(scheme, parse_dict_header(rest)))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    pub fn realm(&self) -> Option<&str> {
        self.get("realm")
    }

    pub fn nonce(&self) -> Option<&str> {
        self.get("nonce")
    }

    pub fn opaque(&self) -> Option<&str> {
        self.get("opaque")
    }

    pub fn qop(&self) -> Option<&str> {
        self.get("qop")
    }

    pub fn to_header(&self) -> String {
        self.to_string()
    }
}

impl Display for WwwAuthenticate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.scheme)?;
        self.params.write_to(f)
    }
}

impl FromStr for WwwAuthenticate {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

//endregion

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST_AUTHORIZATION: &str = r#"Digest username="Mufasa", realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", uri="/dir/index.html", response="e966c932a9242554e42c8ee200cec7f6", nc="00000001", cnonce="0a4f113b", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn test_parse_dict_header() {
        let src = r#"username="Mufasa", realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", uri="/dir/index.html",response="e966c932a9242554e42c8ee200cec7f6", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
        let map = parse_dict_header(src);

        assert_eq!(map.len(), 6);
        assert_eq!(map.get("username"), Some("Mufasa"));
        assert_eq!(map.get("realm"), Some("testrealm@host.com"));
        assert_eq!(map.get("uri"), Some("/dir/index.html"));
        assert_eq!(map.get("response"), Some("e966c932a9242554e42c8ee200cec7f6"));
        assert_eq!(map.get("opaque"), Some("5ccc069c403ebaf9f0171e9517f40e41"));
    }

    #[test]
    fn test_parse_dict_header_tokens() {
        let map = parse_dict_header(r#"qop=auth, stale, realm="a, b", nc=00000001"#);
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["qop", "stale", "realm", "nc"]);
        assert_eq!(map.get("qop"), Some("auth"));
        assert!(map.contains_key("stale"));
        assert_eq!(map.get("stale"), None);
        assert_eq!(map.get("realm"), Some("a, b"));

        assert!(parse_dict_header("").is_empty());
    }

    #[test]
    fn test_parse_http_list_escapes() {
        let list = parse_http_list(r#"a="x\"y", b="c\\d",, c"#);
        assert_eq!(list, vec![r#"a="x"y""#, r#"b="c\d""#, "c"]);
    }

    #[test]
    fn test_parse_digest_authorization() {
        let parsed = Authorization::parse(DIGEST_AUTHORIZATION).unwrap();
        assert_eq!(parsed.scheme(), Scheme::Digest);
        assert_eq!(parsed.username(), Some("Mufasa"));
        assert_eq!(parsed.realm(), Some("testrealm@host.com"));
        assert_eq!(parsed.nonce(), Some("dcd98b7102dd2f0e8b11d0f600bfb0c093"));
        assert_eq!(parsed.uri(), Some("/dir/index.html"));
        assert_eq!(parsed.nc(), Some("00000001"));
        assert_eq!(parsed.cnonce(), Some("0a4f113b"));
        assert_eq!(parsed.response(), Some("e966c932a9242554e42c8ee200cec7f6"));
        assert_eq!(parsed.opaque(), Some("5ccc069c403ebaf9f0171e9517f40e41"));

        let header = parsed.to_header();
        assert!(header.starts_with("Digest "));
        assert!(header.contains(r#"nc="00000001""#));
        assert!(header.contains(r#"cnonce="0a4f113b""#));

        let lower = DIGEST_AUTHORIZATION.replacen("Digest", "digest", 1);
        assert_eq!(Authorization::parse(&lower).unwrap(), parsed);
    }

    #[test]
    fn test_digest_required_fields() {
        let no_opaque = r#"Digest username="u", realm="r", nonce="n", uri="/", response="x""#;
        assert_eq!(
            Authorization::parse(no_opaque),
            Err(MissingRequired("opaque", no_opaque.to_string()))
        );

        let auth_int = r#"Digest username="u", realm="r", nonce="n", uri="/", response="x", opaque="o", qop=auth-int, nc=00000001"#;
        assert!(matches!(
            Authorization::parse(auth_int),
            Err(MissingRequired("cnonce", _))
        ));

        let auth = r#"Digest username="u", realm="r", nonce="n", uri="/", response="x", opaque="o", qop=auth"#;
        assert!(Authorization::parse(auth).is_ok());

        let bad_qop = r#"Digest username="u", realm="r", nonce="n", uri="/", response="x", opaque="o", qop=auth-ints"#;
        assert_eq!(
            Authorization::parse(bad_qop),
            Err(InvalidQop("auth-ints".into()))
        );
    }

    #[test]
    fn test_parse_basic() {
        let parsed = Authorization::parse("Basic dGVzdF91c2VybmFtZTp0ZXN0X3Bhc3N3b3Jk").unwrap();
        assert_eq!(parsed.scheme(), Scheme::Basic);
        assert_eq!(parsed.username(), Some("test_username"));
        assert_eq!(parsed.password(), Some("test_password"));

        // only the first colon separates
        let parsed = Authorization::parse(&Authorization::basic("a", "b:c").to_header()).unwrap();
        assert_eq!(parsed.password(), Some("b:c"));

        // the undecodable payload is not echoed into the error
        match Authorization::parse("Basic !!notbase64") {
            Err(BadEncoding(msg)) => assert!(!msg.contains("notbase64")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            Authorization::parse("Basic bm9jb2xvbg=="),
            Err(MalformedHeader(_))
        ));
    }

    #[test]
    fn test_roundtrip() {
        let basic = Authorization::basic("test_username", "test_password");
        assert_eq!(
            basic.to_header(),
            "Basic dGVzdF91c2VybmFtZTp0ZXN0X3Bhc3N3b3Jk"
        );
        assert_eq!(Authorization::parse(&basic.to_header()).unwrap(), basic);

        let digest = Authorization::parse(DIGEST_AUTHORIZATION).unwrap();
        assert_eq!(Authorization::parse(&digest.to_header()).unwrap(), digest);

        let quoted = digest.with_param("username", r#"Mu"fa\sa"#);
        let parsed = Authorization::parse(&quoted.to_header()).unwrap();
        assert_eq!(parsed.username(), Some(r#"Mu"fa\sa"#));
        assert_eq!(parsed, quoted);
    }

    #[test]
    fn test_parse_oauth_no_validation() {
        let parsed = Authorization::parse(r#"OAuth realm="Photos", oauth_nonce="abc""#).unwrap();
        assert_eq!(parsed.scheme(), Scheme::OAuth);
        assert_eq!(parsed.get("oauth_nonce"), Some("abc"));
        assert!(!parsed.contains_key("oauth_signature"));
    }

    #[test]
    fn test_unsupported_scheme() {
        assert_eq!(
            Authorization::parse("Bearer abc"),
            Err(UnsupportedScheme("Bearer".into()))
        );
        assert!(matches!(Authorization::parse("Digest"), Err(MalformedHeader(_))));
        assert!(matches!(Authorization::parse("   "), Err(MalformedHeader(_))));
        assert!(Authorization::from_parts("NTLM", Params::new()).is_err());
        assert!(Authorization::from_parts("oauth", Params::new()).is_ok());
    }

    #[test]
    fn test_parse_www_authenticate() {
        let src = r#"Digest realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
        let parsed = WwwAuthenticate::parse(src).unwrap();
        assert_eq!(parsed.scheme(), Scheme::Digest);
        assert_eq!(parsed.realm(), Some("testrealm@host.com"));
        assert_eq!(parsed.nonce(), Some("dcd98b7102dd2f0e8b11d0f600bfb0c093"));
        assert_eq!(parsed.opaque(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        assert_eq!(parsed.to_header(), src);
    }

    #[test]
    fn test_www_authenticate_to_header() {
        assert_eq!(
            WwwAuthenticate::with_realm(Scheme::Basic, "Fake Realm").to_header(),
            r#"Basic realm="Fake Realm""#
        );
        assert_eq!(
            WwwAuthenticate::with_realm(Scheme::OAuth, "Fake Realm").to_header(),
            r#"OAuth realm="Fake Realm""#
        );
    }
}
