//! Dialect selection
//!
//! A `(backend, protocol)` pair resolves once, at client construction, into a
//! [`DialectStrategy`]. The strategy owns URL naming, envelope building and
//! response interpretation for its wire generation; the facade never
//! branches on backend or version itself.

use std::fmt;

use super::constants::{LOWERCASE_OBJECT_TYPES, headers, id_domains, namespaces};
use super::error::Result;
use super::pluralization::{hyphenate, pluralize};
use super::request::{self, Action, OperationRequest, PaginationState};
use super::response::{self, ResponseEnvelope};
use super::transport::{HttpRequest, HttpResponse};
use crate::auth::{BackendKind, Credential, ProtocolVersion};
use crate::config::Endpoints;

/// Id fields tagged with `idDomain` by the legacy dialect
const LEGACY_ID_FIELDS: &[&str] = &["Id", "CustomerId", "ItemId"];
const WRAPPED_ID_FIELDS: &[&str] = &["Id"];

/// Static wire settings for one backend/protocol combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectConfig {
    pub backend: BackendKind,
    pub protocol: ProtocolVersion,
    pub base_url: String,
    /// Namespace declarations on outgoing roots, as `(attribute, uri)`
    pub namespaces: Vec<(&'static str, &'static str)>,
    pub content_type: &'static str,
    pub id_domain: &'static str,
    pub id_fields: &'static [&'static str],
}

impl DialectConfig {
    pub fn resolve(backend: BackendKind, protocol: ProtocolVersion, endpoints: &Endpoints) -> Self {
        let base_url = match (protocol, backend) {
            (ProtocolVersion::JsonV3, BackendKind::Online) => &endpoints.online_v3,
            (ProtocolVersion::JsonV3, BackendKind::Desktop) => &endpoints.desktop_v3,
            (_, BackendKind::Online) => &endpoints.online_xml,
            (_, BackendKind::Desktop) => &endpoints.desktop_xml,
        };

        let content_type = match (protocol, backend) {
            (ProtocolVersion::JsonV3, _) => headers::CONTENT_TYPE_JSON,
            (_, BackendKind::Online) => headers::CONTENT_TYPE_XML,
            (_, BackendKind::Desktop) => headers::CONTENT_TYPE_TEXT_XML,
        };

        let namespaces = match (protocol, backend) {
            (ProtocolVersion::WrappedXml, BackendKind::Online) => vec![
                ("xmlns", namespaces::CORE),
                ("xmlns:qbo", namespaces::ONLINE),
            ],
            (ProtocolVersion::WrappedXml, BackendKind::Desktop) => vec![("xmlns", namespaces::CORE)],
            _ => Vec::new(),
        };

        Self {
            backend,
            protocol,
            base_url: base_url.trim_end_matches('/').to_string(),
            namespaces,
            content_type,
            id_domain: match backend {
                BackendKind::Online => id_domains::ONLINE,
                BackendKind::Desktop => id_domains::DESKTOP,
            },
            id_fields: match protocol {
                ProtocolVersion::LegacyXml => LEGACY_ID_FIELDS,
                _ => WRAPPED_ID_FIELDS,
            },
        }
    }

    /// URL segment for `object_type` under `action`
    pub fn url_name(&self, object_type: &str, action: Action) -> String {
        if LOWERCASE_OBJECT_TYPES.contains(&object_type) {
            return object_type.to_lowercase();
        }
        if self.backend == BackendKind::Desktop && self.protocol == ProtocolVersion::WrappedXml {
            return object_type.to_lowercase();
        }

        let name = hyphenate(object_type);
        if action.is_list() { pluralize(&name) } else { name }
    }
}

/// Wire behavior of one dialect
pub trait DialectStrategy: Send + Sync + fmt::Debug {
    fn config(&self) -> &DialectConfig;

    fn build_request(&self, request: &OperationRequest, page: Option<&PaginationState>) -> Result<HttpRequest>;

    fn interpret(&self, request: &OperationRequest, response: &HttpResponse) -> Result<ResponseEnvelope>;

    /// Whether `action` returns a paged collection that must be walked
    fn paginates(&self, action: Action) -> bool;

    fn url_name(&self, object_type: &str, action: Action) -> String {
        self.config().url_name(object_type, action)
    }

    fn content_type(&self) -> &'static str {
        self.config().content_type
    }
}

/// Bare-root XML without namespaces. No search support.
#[derive(Debug, Clone)]
pub struct LegacyXml {
    config: DialectConfig,
    tenant_id: String,
}

/// Namespaced XML. Online uses a bare root; desktop wraps writes in an
/// action envelope.
#[derive(Debug, Clone)]
pub struct WrappedXml {
    config: DialectConfig,
    tenant_id: String,
}

/// JSON over the v3 REST endpoints
#[derive(Debug, Clone)]
pub struct JsonV3 {
    config: DialectConfig,
    tenant_id: String,
}

impl DialectStrategy for LegacyXml {
    fn config(&self) -> &DialectConfig {
        &self.config
    }

    fn build_request(&self, request: &OperationRequest, page: Option<&PaginationState>) -> Result<HttpRequest> {
        if request.action == Action::Search {
            return Err(request::unsupported(&self.config, request.action));
        }
        let url_name = self.url_name(&request.object_type, request.action);
        request::build_xml(&self.config, &self.tenant_id, request, &url_name, page)
    }

    fn interpret(&self, request: &OperationRequest, response: &HttpResponse) -> Result<ResponseEnvelope> {
        response::interpret_xml(&self.config, request, response, self.paginates(request.action))
    }

    fn paginates(&self, action: Action) -> bool {
        action == Action::Read
    }
}

impl DialectStrategy for WrappedXml {
    fn config(&self) -> &DialectConfig {
        &self.config
    }

    fn build_request(&self, request: &OperationRequest, page: Option<&PaginationState>) -> Result<HttpRequest> {
        let url_name = self.url_name(&request.object_type, request.action);
        match self.config.backend {
            BackendKind::Online => request::build_xml(&self.config, &self.tenant_id, request, &url_name, page),
            BackendKind::Desktop => request::build_desktop(&self.config, &self.tenant_id, request, &url_name),
        }
    }

    fn interpret(&self, request: &OperationRequest, response: &HttpResponse) -> Result<ResponseEnvelope> {
        response::interpret_xml(&self.config, request, response, self.paginates(request.action))
    }

    fn paginates(&self, action: Action) -> bool {
        self.config.backend == BackendKind::Online && action.is_list()
    }
}

impl DialectStrategy for JsonV3 {
    fn config(&self) -> &DialectConfig {
        &self.config
    }

    fn build_request(&self, request: &OperationRequest, page: Option<&PaginationState>) -> Result<HttpRequest> {
        request::build_json(&self.config, &self.tenant_id, request, page)
    }

    fn interpret(&self, request: &OperationRequest, response: &HttpResponse) -> Result<ResponseEnvelope> {
        response::interpret_json(request, response, self.paginates(request.action))
    }

    fn paginates(&self, action: Action) -> bool {
        action.is_list()
    }
}

/// Pick the strategy for a credential's backend and protocol
pub fn select(credential: &Credential, endpoints: &Endpoints) -> Box<dyn DialectStrategy> {
    let config = DialectConfig::resolve(credential.backend, credential.protocol, endpoints);
    let tenant_id = credential.tenant_id.clone();

    match credential.protocol {
        ProtocolVersion::LegacyXml => Box::new(LegacyXml { config, tenant_id }),
        ProtocolVersion::WrappedXml => Box::new(WrappedXml { config, tenant_id }),
        ProtocolVersion::JsonV3 => Box::new(JsonV3 { config, tenant_id }),
    }
}

/// Resolve from raw backend/protocol tags, as stored alongside tokens.
/// Unknown tags are configuration errors.
pub fn resolve_tags(backend: &str, protocol: &str, endpoints: &Endpoints) -> Result<DialectConfig> {
    Ok(DialectConfig::resolve(backend.parse()?, protocol.parse()?, endpoints))
}
