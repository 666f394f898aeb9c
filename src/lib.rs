pub mod api;
pub mod auth;
pub mod config;

pub use api::{Field, ObjectTree, QuickbooksClient, QuickbooksError};
pub use auth::{BackendKind, Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore, ProtocolVersion};
pub use config::ClientConfig;
