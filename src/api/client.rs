//! Public client facade
//!
//! [`QuickbooksClient`] is built once per tenant credential. It picks the
//! dialect at construction, signs and sends each exchange, walks paginated
//! collections, and asks the credential store to drop the credential when
//! the backend rejects it.

use log::{debug, error, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::constants::{self, headers};
use super::dialect::{self, DialectStrategy};
use super::error::{ErrorRecord, QuickbooksError, Result};
use super::request::{Action, OperationRequest, PaginationState};
use super::resilience::{ApiLogger, OperationContext, ResilienceConfig, RetryPolicy};
use super::response::{self, ResponseEnvelope};
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use super::tree::ObjectTree;
use crate::auth::{Credential, CredentialStore, OAuthSigner};
use crate::config::ClientConfig;

const APP_MENU_PATH: &str = "account/appmenu";
const DISCONNECT_PATH: &str = "connection/disconnect";

/// Counters for one logical call
#[derive(Debug, Default)]
struct CallStats {
    exchanges: AtomicU32,
    pages: AtomicU32,
}

pub struct QuickbooksClient {
    dialect: Box<dyn DialectStrategy>,
    transport: Arc<dyn Transport>,
    signer: OAuthSigner,
    retry: RetryPolicy,
    logger: ApiLogger,
    timeout: Duration,
    appcenter_url: String,
    credential_store: Option<(Arc<dyn CredentialStore>, String)>,
    invalidated: AtomicBool,
    cancel: CancellationToken,
}

impl QuickbooksClient {
    /// Client over the default reqwest transport
    pub fn new(credential: &Credential, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.connect_timeout(), &config.user_agent)?;
        Self::with_transport(credential, config, Arc::new(transport))
    }

    pub fn with_transport(credential: &Credential, config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let dialect = dialect::select(credential, &config.endpoints);
        debug!(
            "Selected {} dialect for {} tenant {}",
            credential.protocol, credential.backend, credential.tenant_id
        );

        let resilience = config.resilience();
        Ok(Self {
            dialect,
            transport,
            signer: OAuthSigner::new(&config.consumer_key, &config.consumer_secret, credential),
            retry: RetryPolicy::new(resilience.retry),
            logger: ApiLogger::new(resilience.monitoring),
            timeout: config.request_timeout(),
            appcenter_url: config.endpoints.appcenter.clone(),
            credential_store: None,
            invalidated: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    /// Look up `owner`'s credential and bind the client to the store
    pub async fn from_store(store: Arc<dyn CredentialStore>, owner: &str, config: &ClientConfig) -> Result<Self> {
        let credential = store
            .lookup(owner)
            .await
            .map_err(|e| QuickbooksError::Configuration(format!("credential lookup for {} failed: {:#}", owner, e)))?
            .ok_or_else(|| QuickbooksError::Configuration(format!("no credential stored for {}", owner)))?;

        Ok(Self::new(&credential, config)?.with_credential_store(store, owner))
    }

    /// Store to notify when the credential is rejected
    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>, owner: &str) -> Self {
        self.credential_store = Some((store, owner.to_string()));
        self
    }

    /// Replace the retry budget and monitoring derived from the config
    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.retry = RetryPolicy::new(resilience.retry);
        self.logger = ApiLogger::new(resilience.monitoring);
        self
    }

    /// Cooperative cancellation, checked before every attempt and page
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn dialect(&self) -> &dyn DialectStrategy {
        self.dialect.as_ref()
    }

    pub async fn create(&self, object_type: &str, tree: ObjectTree) -> Result<ObjectTree> {
        self.single(OperationRequest::create(object_type, tree))
            .await
            .map(ResponseEnvelope::into_object)
    }

    /// Every object of `object_type`, across all pages
    pub async fn read(&self, object_type: &str) -> Result<Vec<ObjectTree>> {
        self.collect(OperationRequest::read(object_type)).await
    }

    pub async fn get(&self, object_type: &str, id: &str) -> Result<ObjectTree> {
        self.single(OperationRequest::get(object_type, id))
            .await
            .map(ResponseEnvelope::into_object)
    }

    /// `tree` must carry an `Id`
    pub async fn update(&self, object_type: &str, tree: ObjectTree) -> Result<ObjectTree> {
        self.single(OperationRequest::update(object_type, tree)?)
            .await
            .map(ResponseEnvelope::into_object)
    }

    /// `tree` must carry an `Id`; returns the backend acknowledgement
    pub async fn delete(&self, object_type: &str, tree: ObjectTree) -> Result<ObjectTree> {
        self.single(OperationRequest::delete(object_type, tree)?)
            .await
            .map(ResponseEnvelope::into_object)
    }

    /// Exact-match search; all predicates must hold
    pub async fn search<I, K, V>(&self, object_type: &str, predicates: I) -> Result<Vec<ObjectTree>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let predicates = predicates
            .into_iter()
            .map(|(field, value)| (field.into(), value.into()))
            .collect();
        self.collect(OperationRequest::search(object_type, predicates)).await
    }

    /// Raw query statement, v3 only
    pub async fn query(&self, statement: &str) -> Result<Vec<ObjectTree>> {
        self.collect(OperationRequest::query(statement)).await
    }

    /// App-center menu markup, returned as-is
    pub async fn app_menu(&self) -> Result<String> {
        let context = self.logger.start_operation("app_menu", "appcenter");
        let stats = CallStats::default();

        let result = self
            .appcenter_exchange(&context, APP_MENU_PATH, &stats)
            .await
            .and_then(|response| {
                if response.is_success() {
                    Ok(response.body)
                } else {
                    let record = ErrorRecord::new(response.status.to_string(), response.body.trim());
                    Err(response::classify(response.status, record))
                }
            });

        self.finish(&context, &stats, result).await
    }

    /// Revoke the tenant connection. The credential is invalidated on success.
    pub async fn disconnect(&self) -> Result<ObjectTree> {
        let context = self.logger.start_operation("disconnect", "appcenter");
        let stats = CallStats::default();

        let result = self
            .appcenter_exchange(&context, DISCONNECT_PATH, &stats)
            .await
            .and_then(|response| response::interpret_platform(&response));

        if result.is_ok() {
            self.invalidate_credential(&context, "disconnected").await;
        }
        self.finish(&context, &stats, result).await
    }

    async fn single(&self, request: OperationRequest) -> Result<ResponseEnvelope> {
        let context = self.logger.start_operation(request.action.as_str(), entity_label(&request));
        let stats = CallStats::default();
        let result = self.exchange(&context, &request, None, &stats).await;
        self.finish(&context, &stats, result).await
    }

    async fn collect(&self, request: OperationRequest) -> Result<Vec<ObjectTree>> {
        let context = self.logger.start_operation(request.action.as_str(), entity_label(&request));
        let stats = CallStats::default();

        let result = if self.dialect.paginates(request.action) {
            self.paginate(&context, &request, &stats).await
        } else {
            self.exchange(&context, &request, None, &stats)
                .await
                .map(ResponseEnvelope::into_items)
        };

        self.finish(&context, &stats, result).await
    }

    /// Fetch pages until one reports fewer than a full page
    async fn paginate(
        &self,
        context: &OperationContext,
        request: &OperationRequest,
        stats: &CallStats,
    ) -> Result<Vec<ObjectTree>> {
        let mut state = PaginationState::default();
        let mut items = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(QuickbooksError::Cancelled);
            }

            let envelope = self.exchange(context, request, Some(&state), stats).await?;
            stats.pages.fetch_add(1, Ordering::SeqCst);

            let page_count = envelope.page_count.unwrap_or(0);
            let page = envelope.into_items();
            let received = page.len();
            let page_number = state.page_number;
            items.extend(page);

            let more = state.advance(page_count, received);
            self.logger.log_page(context, page_number, page_count, state.total_seen);

            if !more || received == 0 {
                return Ok(items);
            }
        }
    }

    /// One exchange under the retry budget
    async fn exchange(
        &self,
        context: &OperationContext,
        request: &OperationRequest,
        page: Option<&PaginationState>,
        stats: &CallStats,
    ) -> Result<ResponseEnvelope> {
        let this = self;
        self.retry
            .execute_observed(
                &self.cancel,
                |attempt, error, delay| self.logger.log_retry(context, attempt, &error.to_string(), delay),
                move |_| async move {
                    let http = this.dialect.build_request(request, page)?;
                    stats.exchanges.fetch_add(1, Ordering::SeqCst);
                    let response = this.send(context, http).await?;
                    this.dialect.interpret(request, &response)
                },
            )
            .await
    }

    async fn appcenter_exchange(
        &self,
        context: &OperationContext,
        path: &str,
        stats: &CallStats,
    ) -> Result<HttpResponse> {
        let url = constants::appcenter_endpoint(&self.appcenter_url, path);
        let this = self;
        let url = url.as_str();

        self.retry
            .execute_observed(
                &self.cancel,
                |attempt, error, delay| self.logger.log_retry(context, attempt, &error.to_string(), delay),
                move |_| async move {
                    stats.exchanges.fetch_add(1, Ordering::SeqCst);
                    let response = this.send(context, HttpRequest::get(url)).await?;
                    // surface retryable statuses to the policy
                    response::check_status(&response)?;
                    Ok(response)
                },
            )
            .await
    }

    /// Sign and send one request, bounded by the configured timeout
    async fn send(&self, context: &OperationContext, http: HttpRequest) -> Result<HttpResponse> {
        let authorization = self
            .signer
            .authorization_header(http.method.as_str(), &http.url, &http.query)?;
        let http = http.header(headers::AUTHORIZATION, authorization);

        self.logger
            .log_request(context, http.method.as_str(), &http.full_url(), &http.headers);

        let started = Instant::now();
        let response = self.transport.send(http, self.timeout).await?;
        self.logger
            .log_response(context, response.status, &response.headers, started.elapsed());

        Ok(response)
    }

    async fn finish<T>(&self, context: &OperationContext, stats: &CallStats, result: Result<T>) -> Result<T> {
        if let Err(QuickbooksError::AuthenticationFailure(record)) = &result {
            self.invalidate_credential(context, &record.to_string()).await;
        }

        let metrics = context.create_metrics(
            stats.exchanges.load(Ordering::SeqCst),
            stats.pages.load(Ordering::SeqCst),
            result.as_ref().err().map(|e| e.to_string()),
        );
        self.logger.complete_operation(context, &metrics);

        result
    }

    /// Ask the store to drop the credential, at most once per client
    async fn invalidate_credential(&self, context: &OperationContext, reason: &str) {
        let Some((store, owner)) = &self.credential_store else {
            warn!("Credential rejected ({}) but no credential store is attached", reason);
            return;
        };

        if self.invalidated.swap(true, Ordering::SeqCst) {
            debug!("Credential for {} already invalidated", owner);
            return;
        }

        self.logger.log_invalidation(context, owner, reason);
        if let Err(e) = store.invalidate(owner).await {
            error!("Failed to invalidate credential for {}: {:#}", owner, e);
        }
    }
}

fn entity_label(request: &OperationRequest) -> &str {
    if request.action == Action::Query {
        "query"
    } else {
        &request.object_type
    }
}

impl std::fmt::Debug for QuickbooksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuickbooksClient")
            .field("dialect", &self.dialect)
            .field("timeout", &self.timeout)
            .field("retry", self.retry.config())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::TransportError;
    use crate::auth::{BackendKind, ProtocolVersion};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with `body` and records every request
    struct EchoTransport {
        status: u16,
        body: String,
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, request: HttpRequest, _timeout: Duration) -> std::result::Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse::new(self.status, self.body.clone()))
        }
    }

    fn client(protocol: ProtocolVersion, status: u16, body: &str) -> (QuickbooksClient, Arc<EchoTransport>) {
        let transport = Arc::new(EchoTransport {
            status,
            body: body.to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let credential = Credential::new("tok", "tok-secret", "99", BackendKind::Online, protocol);
        let client =
            QuickbooksClient::with_transport(&credential, &ClientConfig::new("ck", "cs"), transport.clone()).unwrap();
        (client, transport)
    }

    #[test]
    fn test_missing_consumer_key_rejected() {
        let credential = Credential::new("tok", "sec", "1", BackendKind::Online, ProtocolVersion::JsonV3);
        let err = QuickbooksClient::new(&credential, &ClientConfig::default()).unwrap_err();
        assert!(matches!(err, QuickbooksError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_requests_are_signed() {
        let (client, transport) = client(ProtocolVersion::JsonV3, 200, r#"{"Customer":{"Id":"1"}}"#);
        client.get("Customer", "1").await.unwrap();

        let seen = transport.seen.lock().unwrap();
        let authorization = seen[0].header_value(headers::AUTHORIZATION).unwrap();
        assert!(authorization.starts_with("OAuth "));
        assert!(authorization.contains("oauth_consumer_key=\"ck\""));
        assert_eq!(seen[0].url, "https://quickbooks.api.intuit.com/v3/company/99/customer/1");
    }

    #[tokio::test]
    async fn test_update_without_id_sends_nothing() {
        let (client, transport) = client(ProtocolVersion::JsonV3, 200, "{}");
        let err = client
            .update("Customer", ObjectTree::new().with("DisplayName", "x"))
            .await
            .unwrap_err();

        assert!(matches!(err, QuickbooksError::InvalidRequest(_)));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_unsupported_on_xml() {
        let (client, transport) = client(ProtocolVersion::WrappedXml, 200, "<x/>");
        let err = client.query("select * from Customer").await.unwrap_err();

        assert!(matches!(err, QuickbooksError::UnsupportedOperation(_)));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_app_menu_returns_raw_markup() {
        let (client, transport) = client(ProtocolVersion::JsonV3, 200, "<div>menu</div>");
        assert_eq!(client.app_menu().await.unwrap(), "<div>menu</div>");
        assert_eq!(
            transport.seen.lock().unwrap()[0].url,
            "https://appcenter.intuit.com/api/v1/account/appmenu"
        );
    }
}
