use std::fmt::{self, Display, Formatter};
use std::result;

#[derive(Debug, PartialEq)]
pub enum Error {
    MalformedHeader(String),
    UnsupportedScheme(String),
    InvalidQop(String),
    MissingRequired(&'static str, String),
    UnknownAlgorithm(String),
    UnsupportedUrl(String),
    InvalidUrl(String),
    StaleTimestamp { given: i64, now: i64, threshold: u64 },
    CredentialsMismatch,
    ResponseMismatch,
    SignatureMismatch,
    UnknownSignatureMethod(String),
    BadEncoding(String),
    NumParseError,
}

pub type Result<T> = result::Result<T, Error>;

use Error::*;

impl Error {
    /// Errors caused by the shape of the credentials rather than by their values.
    /// The guards answer these with a fresh challenge.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            MalformedHeader(_)
                | UnsupportedScheme(_)
                | MissingRequired(..)
                | BadEncoding(_)
                | NumParseError
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MalformedHeader(ctx) => write!(f, "Malformed header: {}", ctx),
            UnsupportedScheme(ctx) => write!(f, "Unsupported auth scheme: {}", ctx),
            InvalidQop(ctx) => write!(f, "Invalid qop value: {}", ctx),
            MissingRequired(what, ctx) => write!(f, "Missing \"{}\" in {}", what, ctx),
            UnknownAlgorithm(ctx) => write!(f, "Unknown algorithm: {}", ctx),
            UnsupportedUrl(ctx) => write!(f, "Unsupported URL scheme: {}", ctx),
            InvalidUrl(ctx) => write!(f, "Invalid URL: {}", ctx),
            StaleTimestamp {
                given,
                now,
                threshold,
            } => write!(
                f,
                "Expired timestamp: given {} and now {} has a greater difference than threshold {}",
                given, now, threshold
            ),
            CredentialsMismatch => write!(f, "Username or password does not match"),
            ResponseMismatch => write!(f, "Digest response does not match"),
            SignatureMismatch => write!(f, "OAuth signature does not match"),
            UnknownSignatureMethod(ctx) => write!(f, "Unknown signature method: {}", ctx),
            BadEncoding(ctx) => write!(f, "Bad encoding: {}", ctx),
            NumParseError => write!(f, "Error parsing a number."),
        }
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(_: std::num::ParseIntError) -> Self {
        NumParseError
    }
}

impl std::error::Error for Error {}
