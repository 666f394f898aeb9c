//! Shared stubs for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quickbooks_client::api::{HttpRequest, HttpResponse, Transport, TransportError};
use quickbooks_client::auth::{BackendKind, Credential, CredentialStore, MemoryCredentialStore, ProtocolVersion};
use quickbooks_client::{ClientConfig, QuickbooksClient};

pub const CORE_NS: &str = "http://www.intuit.com/sb/cdm/v2";
pub const ONLINE_NS: &str = "http://www.intuit.com/sb/cdm/qbo";
pub const OWNER: &str = "owner-1";
pub const TENANT: &str = "99";

pub type Reply = Result<HttpResponse, TransportError>;

/// Plays back scripted replies in order and records every request
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    requests: Mutex<Vec<HttpRequest>>,
    timeouts: Mutex<Vec<Duration>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }

    /// Same reply for every request
    pub fn repeating(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            fallback: Some(reply),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Timeout handed to each exchange, in order
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    pub fn exchange_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.timeouts.lock().unwrap().push(timeout);

        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        self.fallback
            .clone()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
    }
}

/// Memory store that counts invalidation requests
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryCredentialStore,
    invalidations: AtomicUsize,
}

impl CountingStore {
    pub fn with(owner: &str, credential: Credential) -> Arc<Self> {
        let store = Self::default();
        store.inner.insert(owner, credential).unwrap();
        Arc::new(store)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn lookup(&self, owner: &str) -> anyhow::Result<Option<Credential>> {
        self.inner.lookup(owner).await
    }

    async fn invalidate(&self, owner: &str) -> anyhow::Result<()> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(owner).await
    }
}

pub fn ok(body: impl Into<String>) -> Reply {
    Ok(HttpResponse::new(200, body))
}

pub fn status(code: u16, body: impl Into<String>) -> Reply {
    Ok(HttpResponse::new(code, body))
}

pub fn try_later() -> Reply {
    status(
        500,
        r#"{"Fault":{"Error":[{"Message":"An application error has occurred","code":"10000"}],"type":"SystemFault"}}"#,
    )
}

pub fn credential(backend: BackendKind, protocol: ProtocolVersion) -> Credential {
    Credential::new("access-key", "access-secret", TENANT, backend, protocol)
}

pub fn config() -> ClientConfig {
    ClientConfig::new("consumer-key", "consumer-secret")
}

/// Client bound to a counting store holding its credential
pub fn client(
    backend: BackendKind,
    protocol: ProtocolVersion,
    transport: Arc<ScriptedTransport>,
) -> (QuickbooksClient, Arc<CountingStore>) {
    let credential = credential(backend, protocol);
    let store = CountingStore::with(OWNER, credential.clone());
    let client = QuickbooksClient::with_transport(&credential, &config(), transport)
        .unwrap()
        .with_credential_store(store.clone(), OWNER);
    (client, store)
}

/// v3 query page holding `count` customers numbered from `first`
pub fn json_page(first: usize, count: usize) -> String {
    let customers: Vec<_> = (first..first + count)
        .map(|id| json!({"Id": id.to_string(), "DisplayName": format!("Customer {}", id)}))
        .collect();
    json!({
        "QueryResponse": {"Customer": customers, "startPosition": first, "maxResults": count},
        "time": "2013-04-01T10:00:00-07:00"
    })
    .to_string()
}

/// Online XML search page holding `count` customers numbered from `first`
pub fn xml_page(first: usize, count: usize) -> String {
    let customers: String = (first..first + count)
        .map(|id| format!(r#"<Customer><Id idDomain="QBO">{}</Id><Name>Customer {}</Name></Customer>"#, id, id))
        .collect();
    format!(
        r#"<qbo:SearchResults xmlns="{}" xmlns:qbo="{}"><qbo:CdmCollections>{}</qbo:CdmCollections><qbo:Count>{}</qbo:Count><qbo:CurrentPage>1</qbo:CurrentPage></qbo:SearchResults>"#,
        CORE_NS, ONLINE_NS, customers, count
    )
}

pub fn fault_info(code: &str, cause: &str, message: &str) -> String {
    format!(
        r#"<FaultInfo xmlns="{}"><Message>{}</Message><ErrorCode>{}</ErrorCode><Cause>{}</Cause></FaultInfo>"#,
        CORE_NS, message, code, cause
    )
}
