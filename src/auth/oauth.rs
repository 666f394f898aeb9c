//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! The data services authenticate every request with an `Authorization: OAuth`
//! header signed by the application consumer secret and the tenant's access
//! secret.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;

use crate::api::error::{QuickbooksError, Result};
use crate::auth::credentials::Credential;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Signs outgoing requests for one tenant credential
#[derive(Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    token: String,
    token_secret: String,
}

impl OAuthSigner {
    pub fn new(consumer_key: &str, consumer_secret: &str, credential: &Credential) -> Self {
        Self {
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
            token: credential.access_key.clone(),
            token_secret: credential.access_secret.clone(),
        }
    }

    /// Build the `Authorization` header value with a fresh nonce and timestamp
    pub fn authorization_header(&self, method: &str, url: &str, query: &[(String, String)]) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, query, &nonce, &timestamp)
    }

    /// Deterministic variant used by [`Self::authorization_header`]
    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        query: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.clone()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];

        let mut all_params = oauth_params.clone();
        all_params.extend(query.iter().cloned());

        let base = signature_base_string(method, url, &all_params);
        let signature = self.sign(&base)?;
        oauth_params.push(("oauth_signature".to_string(), signature));

        let header = oauth_params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", encode(key), encode(value)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {}", header))
    }

    fn sign(&self, base: &str) -> Result<String> {
        let key = format!("{}&{}", encode(&self.consumer_secret), encode(&self.token_secret));
        let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
            .map_err(|e| QuickbooksError::Configuration(format!("invalid signing key: {}", e)))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for OAuthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSigner")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

/// RFC 3986 percent-encoding (unreserved characters pass through)
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `METHOD&enc(base_url)&enc(sorted, encoded params)`
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (encode(key), encode(value)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&param_string)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{BackendKind, ProtocolVersion};

    fn signer(token_secret: &str) -> OAuthSigner {
        let credential = Credential::new(
            "access-token",
            token_secret,
            "1234",
            BackendKind::Online,
            ProtocolVersion::JsonV3,
        );
        OAuthSigner::new("consumer", "consumer-secret", &credential)
    }

    #[test]
    fn test_base_string_sorts_and_encodes() {
        let params = vec![
            ("b".to_string(), "2 3".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let base = signature_base_string("get", "https://example.com/r", &params);
        assert_eq!(base, "GET&https%3A%2F%2Fexample.com%2Fr&a%3D1%26b%3D2%25203");
    }

    #[test]
    fn test_header_lists_oauth_params() {
        let header = signer("secret")
            .authorization_header_with("GET", "https://example.com", &[], "nonce", "1700000000")
            .unwrap();

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_consumer_key=\"consumer\""));
        assert!(header.contains("oauth_token=\"access-token\""));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(header.contains("oauth_timestamp=\"1700000000\""));
        assert!(header.contains("oauth_signature=\""));
    }

    #[test]
    fn test_signature_is_deterministic_and_secret_bound() {
        let query = vec![("PageNum".to_string(), "1".to_string())];
        let first = signer("secret")
            .authorization_header_with("GET", "https://example.com", &query, "n", "1")
            .unwrap();
        let second = signer("secret")
            .authorization_header_with("GET", "https://example.com", &query, "n", "1")
            .unwrap();
        let other = signer("another")
            .authorization_header_with("GET", "https://example.com", &query, "n", "1")
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_random_nonce_changes_header() {
        let signer = signer("secret");
        let first = signer.authorization_header("GET", "https://example.com", &[]).unwrap();
        let second = signer.authorization_header("GET", "https://example.com", &[]).unwrap();
        assert_ne!(first, second);
    }
}
