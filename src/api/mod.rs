//! QuickBooks data-services client
//!
//! One facade over three wire generations (legacy XML, wrapped XML, v3 JSON)
//! and two backends (online, desktop gateway).

pub mod client;
pub mod codec;
pub mod constants;
pub mod dialect;
pub mod error;
pub mod pluralization;
pub mod request;
pub mod resilience;
pub mod response;
pub mod transport;
pub mod tree;

pub use client::QuickbooksClient;
pub use codec::{CodecError, TagNotFound};
pub use dialect::{DialectConfig, DialectStrategy};
pub use error::{ErrorKind, ErrorRecord, QuickbooksError, Result, TransportError};
pub use request::{Action, OperationRequest, PaginationState};
pub use resilience::{ApiLogger, LogLevel, MonitoringConfig, ResilienceConfig, RetryConfig, RetryPolicy};
pub use response::{Payload, ResponseEnvelope};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
pub use tree::{Field, ObjectTree};
