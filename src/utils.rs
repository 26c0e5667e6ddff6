use std::string::ToString;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{Error, Result};

/// RFC 3986 unreserved characters stay as they are, everything else is escaped
const OAUTH_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// slash quoting for digest strings
pub trait QuoteForDigest {
    fn quote_for_digest(&self) -> String;
}

impl QuoteForDigest for &str {
    fn quote_for_digest(&self) -> String {
        self.to_string().quote_for_digest()
    }
}

impl QuoteForDigest for String {
    fn quote_for_digest(&self) -> String {
        self.replace("\\", "\\\\").replace("\"", "\\\"")
    }
}

/// Percent-escape a value for OAuth signing. Only `~` is kept on top of the
/// alphanumerics and `-._`, so `/` and `&` are always escaped.
pub fn url_escape(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ESCAPE_SET).to_string()
}

/// Reverse of [`url_escape`]. The error does not carry the value, which may be a secret.
pub fn url_unescape(value: &str) -> Result<String> {
    percent_decode_str(value)
        .decode_utf8()
        .map(|v| v.into_owned())
        .map_err(|e| Error::BadEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_for_digest() {
        assert_eq!(r#"a"b\c"#.quote_for_digest(), r#"a\"b\\c"#);
        assert_eq!("plain".quote_for_digest(), "plain");
    }

    #[test]
    fn test_url_escape() {
        assert_eq!(url_escape("http://a.b/c d~e"), "http%3A%2F%2Fa.b%2Fc%20d~e");
        assert_eq!(url_escape("a=1&b=2"), "a%3D1%26b%3D2");
        assert_eq!(url_escape("€"), "%E2%82%AC");
    }

    #[test]
    fn test_url_unescape() {
        assert_eq!(url_unescape("kd94hf93k423kf44%26").unwrap(), "kd94hf93k423kf44&");
        match url_unescape("s3cr3t%FF") {
            Err(Error::BadEncoding(msg)) => assert!(!msg.contains("s3cr3t")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
