use serde::Deserialize;

use crate::oauth::TIMESTAMP_THRESHOLD;

/// Settings shared by the Basic, Digest and OAuth guards
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Realm announced in every challenge
    pub realm: String,
    /// Maximum age of `oauth_timestamp`, in seconds
    pub timestamp_threshold: u64,
    /// Digest qop list offered when the route does not pin one
    pub digest_qop: String,
    /// Verify an unknown `oauth_signature_method` as PLAINTEXT instead of rejecting it
    pub plaintext_fallback: bool,
    /// Accepted values of the version path segment of the OAuth endpoints
    pub oauth_versions: Vec<String>,
    /// One of these goes into OAuth failure payloads
    pub taglines: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: "Fake Realm".into(),
            timestamp_threshold: TIMESTAMP_THRESHOLD,
            digest_qop: "auth,auth-int".into(),
            plaintext_fallback: false,
            oauth_versions: vec!["1.0".into(), "2.0".into()],
            taglines: vec![
                "Signatures are hard.".into(),
                "Check your base string.".into(),
                "Did you escape twice?".into(),
                "Almost there.".into(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"realm": "Test", "plaintext_fallback": true}"#).unwrap();
        assert_eq!(config.realm, "Test");
        assert!(config.plaintext_fallback);
        assert_eq!(config.timestamp_threshold, 300);
        assert_eq!(config.digest_qop, "auth,auth-int");
        assert_eq!(config.oauth_versions, vec!["1.0", "2.0"]);
    }
}
