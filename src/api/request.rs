//! Request builder: turns an [`OperationRequest`] into a dialect envelope
//!
//! Three envelope families exist. The v3 JSON dialect sends the object body
//! directly and reads through the query endpoint. The online XML dialects
//! send a bare (optionally namespaced) root named after the object type. The
//! desktop wrapped dialect nests the object in an `Add`/`Mod`/`Del` action
//! element carrying request metadata, and searches with a `<Type>Query` root.

use std::fmt;
use uuid::Uuid;

use super::codec::{json, xml};
use super::constants::{self, PAGE_SIZE, headers, namespaces};
use super::dialect::DialectConfig;
use super::error::{QuickbooksError, Result};
use super::transport::HttpRequest;
use super::tree::ObjectTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Get,
    Update,
    Delete,
    Search,
    Query,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Get => "get",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Search => "search",
            Action::Query => "query",
        }
    }

    /// Actions addressed to the plural collection URL
    pub fn is_list(&self) -> bool {
        matches!(self, Action::Read | Action::Search)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Object(ObjectTree),
    /// Exact-match field/value pairs, ANDed
    Filter(Vec<(String, String)>),
    Statement(String),
}

/// One logical call, built by the facade and consumed by a dialect
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub object_type: String,
    pub action: Action,
    pub object_id: Option<String>,
    pub body: RequestBody,
    pub extra_params: Vec<(String, String)>,
}

impl OperationRequest {
    fn new(object_type: &str, action: Action, body: RequestBody) -> Self {
        Self {
            object_type: object_type.to_string(),
            action,
            object_id: None,
            body,
            extra_params: Vec::new(),
        }
    }

    pub fn create(object_type: &str, tree: ObjectTree) -> Self {
        Self::new(object_type, Action::Create, RequestBody::Object(tree))
    }

    pub fn read(object_type: &str) -> Self {
        Self::new(object_type, Action::Read, RequestBody::Empty)
    }

    pub fn get(object_type: &str, id: &str) -> Self {
        let mut request = Self::new(object_type, Action::Get, RequestBody::Empty);
        request.object_id = Some(id.to_string());
        request
    }

    /// Fails with [`QuickbooksError::InvalidRequest`] when `tree` has no `Id`
    pub fn update(object_type: &str, tree: ObjectTree) -> Result<Self> {
        Self::with_id(object_type, Action::Update, tree)
    }

    pub fn delete(object_type: &str, tree: ObjectTree) -> Result<Self> {
        Self::with_id(object_type, Action::Delete, tree)
    }

    pub fn search(object_type: &str, predicates: Vec<(String, String)>) -> Self {
        Self::new(object_type, Action::Search, RequestBody::Filter(predicates))
    }

    pub fn query(statement: &str) -> Self {
        Self::new("", Action::Query, RequestBody::Statement(statement.to_string()))
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    fn with_id(object_type: &str, action: Action, tree: ObjectTree) -> Result<Self> {
        let id = tree.get_text("Id").filter(|id| !id.is_empty()).ok_or_else(|| {
            QuickbooksError::InvalidRequest(format!("{} of {} requires an Id field", action, object_type))
        })?;

        let mut request = Self::new(object_type, action, RequestBody::Object(tree));
        request.object_id = Some(id);
        Ok(request)
    }

    fn object(&self) -> Result<&ObjectTree> {
        match &self.body {
            RequestBody::Object(tree) => Ok(tree),
            _ => Err(QuickbooksError::InvalidRequest(format!(
                "{} of {} requires an object body",
                self.action, self.object_type
            ))),
        }
    }

    fn filter(&self) -> &[(String, String)] {
        match &self.body {
            RequestBody::Filter(predicates) => predicates,
            _ => &[],
        }
    }

    fn id(&self) -> Result<&str> {
        self.object_id.as_deref().ok_or_else(|| {
            QuickbooksError::InvalidRequest(format!("{} of {} requires an id", self.action, self.object_type))
        })
    }
}

/// Page cursor for collection reads. Discarded once a short page arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    pub page_number: usize,
    pub page_size: usize,
    pub total_seen: usize,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: PAGE_SIZE,
            total_seen: 0,
        }
    }
}

impl PaginationState {
    /// 1-based offset of the first item on the current page
    pub fn start_position(&self) -> usize {
        (self.page_number - 1) * self.page_size + 1
    }

    /// Record a page; returns true when another page should be fetched
    pub fn advance(&mut self, page_count: usize, received: usize) -> bool {
        self.total_seen += received;
        if page_count < self.page_size {
            return false;
        }
        self.page_number += 1;
        true
    }
}

fn encode_failure(object_type: &str, error: super::codec::CodecError) -> QuickbooksError {
    QuickbooksError::InvalidRequest(format!("cannot encode {}: {}", object_type, error))
}

// v3 JSON

/// `select * from T [where A = 'v' and ...] startposition N maxresults M`
pub fn select_statement(object_type: &str, predicates: &[(String, String)], page: &PaginationState) -> String {
    let mut statement = format!("select * from {}", object_type);

    if !predicates.is_empty() {
        let clauses = predicates
            .iter()
            .map(|(field, value)| format!("{} = '{}'", field, value.replace('\'', "\\'")))
            .collect::<Vec<_>>()
            .join(" and ");
        statement.push_str(" where ");
        statement.push_str(&clauses);
    }

    statement.push_str(&format!(
        " startposition {} maxresults {}",
        page.start_position(),
        page.page_size
    ));
    statement
}

pub fn build_json(
    config: &DialectConfig,
    tenant_id: &str,
    request: &OperationRequest,
    page: Option<&PaginationState>,
) -> Result<HttpRequest> {
    let entity_url = constants::company_endpoint(&config.base_url, tenant_id, &request.object_type);
    let query_url = constants::query_endpoint(&config.base_url, tenant_id);

    let http = match request.action {
        Action::Create => HttpRequest::post(entity_url).body(json_body(request)?),
        Action::Update => HttpRequest::post(entity_url)
            .query("operation", "update")
            .body(json_body(request)?),
        Action::Delete => HttpRequest::post(entity_url)
            .query("operation", "delete")
            .body(json_body(request)?),
        Action::Get => HttpRequest::get(constants::company_record_endpoint(
            &config.base_url,
            tenant_id,
            &request.object_type,
            request.id()?,
        )),
        Action::Read | Action::Search => {
            let page = page.copied().unwrap_or_default();
            HttpRequest::get(query_url).query(
                "query",
                select_statement(&request.object_type, request.filter(), &page),
            )
        }
        Action::Query => match &request.body {
            RequestBody::Statement(statement) => HttpRequest::get(query_url).query("query", statement.clone()),
            _ => return Err(QuickbooksError::InvalidRequest("query requires a statement".to_string())),
        },
    };

    Ok(with_extra_params(http, request)
        .header(headers::CONTENT_TYPE, config.content_type)
        .header(headers::ACCEPT, headers::CONTENT_TYPE_JSON))
}

fn json_body(request: &OperationRequest) -> Result<String> {
    json::encode(request.object()?).map_err(|e| encode_failure(&request.object_type, e))
}

// online XML, bare root

/// `Name :EQUALS: Acme :AND: Active :EQUALS: true`
pub fn filter_string(predicates: &[(String, String)]) -> String {
    predicates
        .iter()
        .map(|(field, value)| format!("{} :EQUALS: {}", field, value))
        .collect::<Vec<_>>()
        .join(" :AND: ")
}

fn xml_options(config: &DialectConfig) -> xml::EncodeOptions {
    let mut options = xml::EncodeOptions::new(config.id_domain, config.id_fields);
    for (name, uri) in &config.namespaces {
        options = options.attribute(*name, *uri);
    }
    options
}

pub fn build_xml(
    config: &DialectConfig,
    tenant_id: &str,
    request: &OperationRequest,
    url_name: &str,
    page: Option<&PaginationState>,
) -> Result<HttpRequest> {
    let resource_url = constants::xml_resource_endpoint(&config.base_url, url_name, tenant_id);

    let http = match request.action {
        Action::Create => HttpRequest::post(resource_url).body(bare_body(config, request)?),
        Action::Update => {
            let (_, id) = xml::split_id(request.id()?, config.id_domain);
            let url = constants::xml_record_endpoint(&config.base_url, url_name, tenant_id, id);
            HttpRequest::post(url).body(bare_body(config, request)?)
        }
        Action::Delete => {
            let (_, id) = xml::split_id(request.id()?, config.id_domain);
            let url = constants::xml_record_endpoint(&config.base_url, url_name, tenant_id, id);
            HttpRequest::post(url)
                .query("methodx", "delete")
                .body(bare_body(config, request)?)
        }
        Action::Get => record_get(config, tenant_id, url_name, request.id()?),
        Action::Read | Action::Search => {
            let page = page.copied().unwrap_or_default();
            let mut http = HttpRequest::get(resource_url)
                .query("PageNum", page.page_number.to_string())
                .query("ResultsPerPage", page.page_size.to_string());
            if request.action == Action::Search {
                http = http.query("Filter", filter_string(request.filter()));
            }
            http
        }
        Action::Query => return Err(unsupported(config, request.action)),
    };

    Ok(with_content_type(with_extra_params(http, request), config))
}

fn bare_body(config: &DialectConfig, request: &OperationRequest) -> Result<String> {
    xml::encode(&request.object_type, request.object()?, &xml_options(config))
        .map_err(|e| encode_failure(&request.object_type, e))
}

fn record_get(config: &DialectConfig, tenant_id: &str, url_name: &str, id: &str) -> HttpRequest {
    let (domain, id) = xml::split_id(id, config.id_domain);
    HttpRequest::get(constants::xml_record_endpoint(&config.base_url, url_name, tenant_id, id)).query("idDomain", domain)
}

// desktop XML, action envelope

fn envelope_root(action: Action) -> Option<&'static str> {
    match action {
        Action::Create => Some("Add"),
        Action::Update => Some("Mod"),
        Action::Delete => Some("Del"),
        _ => None,
    }
}

/// Fresh request identifier for the `RequestId` attribute
pub fn request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn build_desktop(
    config: &DialectConfig,
    tenant_id: &str,
    request: &OperationRequest,
    url_name: &str,
) -> Result<HttpRequest> {
    let resource_url = constants::xml_resource_endpoint(&config.base_url, url_name, tenant_id);
    let options = xml::EncodeOptions::new(config.id_domain, config.id_fields).attribute("xmlns", namespaces::CORE);

    let http = match request.action {
        Action::Create | Action::Update | Action::Delete => {
            let root = envelope_root(request.action).ok_or_else(|| unsupported(config, request.action))?;
            let envelope = ObjectTree::new()
                .with("OfferingId", constants::OFFERING_ID)
                .with("ExternalRealmId", tenant_id)
                .with(request.object_type.as_str(), request.object()?.clone());
            let body = xml::encode(root, &envelope, &options.attribute("RequestId", request_id()))
                .map_err(|e| encode_failure(&request.object_type, e))?;
            HttpRequest::post(resource_url).body(body)
        }
        Action::Read | Action::Search => {
            let mut query = ObjectTree::new();
            for (field, value) in request.filter() {
                query.insert(field.as_str(), value.as_str());
            }
            let root = format!("{}Query", request.object_type);
            let body = xml::encode(&root, &query, &options).map_err(|e| encode_failure(&request.object_type, e))?;
            HttpRequest::post(resource_url).body(body)
        }
        Action::Get => record_get(config, tenant_id, url_name, request.id()?),
        Action::Query => return Err(unsupported(config, request.action)),
    };

    Ok(with_content_type(with_extra_params(http, request), config))
}

fn with_extra_params(mut http: HttpRequest, request: &OperationRequest) -> HttpRequest {
    for (key, value) in &request.extra_params {
        http = http.query(key.as_str(), value.as_str());
    }
    http
}

fn with_content_type(http: HttpRequest, config: &DialectConfig) -> HttpRequest {
    if http.body.is_some() {
        http.header(headers::CONTENT_TYPE, config.content_type)
    } else {
        http
    }
}

pub fn unsupported(config: &DialectConfig, action: Action) -> QuickbooksError {
    QuickbooksError::UnsupportedOperation(format!(
        "{} is not supported by the {} dialect on {}",
        action, config.protocol, config.backend
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_requires_id() {
        let tree = ObjectTree::new().with("Name", "Acme");
        let err = OperationRequest::update("Customer", tree).unwrap_err();
        assert!(matches!(err, QuickbooksError::InvalidRequest(_)));

        let request = OperationRequest::delete("Customer", ObjectTree::new().with("Id", "QB:4")).unwrap();
        assert_eq!(request.object_id.as_deref(), Some("QB:4"));
    }

    #[test]
    fn test_select_statement_escapes_quotes() {
        let predicates = vec![
            ("DisplayName".to_string(), "O'Brien".to_string()),
            ("Active".to_string(), "true".to_string()),
        ];
        let page = PaginationState::default();
        assert_eq!(
            select_statement("Customer", &predicates, &page),
            "select * from Customer where DisplayName = 'O\\'Brien' and Active = 'true' startposition 1 maxresults 100"
        );
    }

    #[test]
    fn test_filter_string() {
        let predicates = vec![
            ("Name".to_string(), "Acme".to_string()),
            ("Active".to_string(), "true".to_string()),
        ];
        assert_eq!(filter_string(&predicates), "Name :EQUALS: Acme :AND: Active :EQUALS: true");
    }

    #[test]
    fn test_pagination_advances_until_short_page() {
        let mut page = PaginationState::default();
        assert!(page.advance(100, 100));
        assert_eq!(page.page_number, 2);
        assert_eq!(page.start_position(), 101);
        assert!(!page.advance(37, 37));
        assert_eq!(page.total_seen, 137);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let first = request_id();
        assert_eq!(first.len(), 32);
        assert_ne!(first, request_id());
    }
}
