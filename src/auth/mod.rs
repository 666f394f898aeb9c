//! Credentials, the external credential-store boundary, and request signing

pub mod credentials;
pub mod oauth;
pub mod store;

pub use credentials::{BackendKind, Credential, CredentialStore, MemoryCredentialStore, ProtocolVersion};
pub use oauth::OAuthSigner;
pub use store::FileCredentialStore;
