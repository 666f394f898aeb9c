//! Response interpreter and error classifier
//!
//! Each HTTP exchange ends here as either a [`ResponseEnvelope`] or exactly
//! one classified [`QuickbooksError`].

use roxmltree::{Document, Node};

use super::codec::{json, xml};
use super::constants::{markers, namespaces};
use super::dialect::DialectConfig;
use super::error::{DEFAULT_ERROR_CODE, ErrorRecord, QuickbooksError, Result};
use super::request::{Action, OperationRequest};
use super::transport::HttpResponse;
use super::tree::{Field, ObjectTree};

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Object(ObjectTree),
    Collection(Vec<ObjectTree>),
}

/// Successful outcome of one exchange. `page_count` is set when the
/// response is one page of a paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub payload: Payload,
    pub page_count: Option<usize>,
}

impl ResponseEnvelope {
    pub fn object(tree: ObjectTree) -> Self {
        Self {
            payload: Payload::Object(tree),
            page_count: None,
        }
    }

    pub fn collection(items: Vec<ObjectTree>) -> Self {
        Self {
            payload: Payload::Collection(items),
            page_count: None,
        }
    }

    pub fn page(items: Vec<ObjectTree>, count: usize) -> Self {
        Self {
            payload: Payload::Collection(items),
            page_count: Some(count),
        }
    }

    pub fn into_object(self) -> ObjectTree {
        match self.payload {
            Payload::Object(tree) => tree,
            Payload::Collection(items) => ObjectTree::new().with("Items", items),
        }
    }

    pub fn into_items(self) -> Vec<ObjectTree> {
        match self.payload {
            Payload::Object(tree) => vec![tree],
            Payload::Collection(items) => items,
        }
    }
}

/// Map a backend error record to the taxonomy
pub fn classify(status: u16, record: ErrorRecord) -> QuickbooksError {
    if status == 401
        || markers::AUTH_FAILURE_CODES.contains(&record.code.as_str())
        || record.message.contains(markers::AUTH_FAILURE_MESSAGE)
    {
        return QuickbooksError::AuthenticationFailure(record);
    }

    if record.cause == markers::DUPLICATE_CAUSE || record.sub_code.as_deref() == Some(markers::DUPLICATE_SUB_CODE) {
        return QuickbooksError::DuplicateItem(record);
    }

    if status == 404 || record.code == markers::NOT_FOUND_CODE {
        return QuickbooksError::NotFound(record);
    }

    QuickbooksError::Api(record)
}

/// Status checks that need no body parsing: 401 and the 500 try-later marker
pub fn check_status(response: &HttpResponse) -> Result<()> {
    let body = response.body.trim();

    if response.status == 401 {
        let message = if body.is_empty() { "Unauthorized" } else { body };
        return Err(QuickbooksError::AuthenticationFailure(ErrorRecord::new("401", message)));
    }

    if response.status == 500 && body.contains(markers::TRY_LATER_CODE) {
        return Err(QuickbooksError::TryLater(
            ErrorRecord::new(markers::TRY_LATER_CODE, body).with_cause("500"),
        ));
    }

    Ok(())
}

/// A body that is not the expected wire format
fn unparseable(response: &HttpResponse, detail: String) -> QuickbooksError {
    if response.is_success() {
        QuickbooksError::Communication {
            message: format!("malformed response: {}", detail),
            raw: response.body.clone(),
        }
    } else {
        classify(response.status, status_record(response))
    }
}

fn status_record(response: &HttpResponse) -> ErrorRecord {
    ErrorRecord::new(response.status.to_string(), response.body.trim())
}

fn not_found(request: &OperationRequest) -> QuickbooksError {
    let id = request.object_id.as_deref().unwrap_or_default();
    QuickbooksError::NotFound(ErrorRecord::new(
        markers::NOT_FOUND_CODE,
        format!("{} {} not found", request.object_type, id),
    ))
}

// XML

/// Error record from a `FaultInfo` root or an `Error` element under the root
fn xml_fault(root: Node<'_, '_>) -> Option<ErrorRecord> {
    let fault = match root.tag_name().name() {
        "FaultInfo" | "Error" => root,
        _ => {
            let namespace = root.tag_name().namespace().unwrap_or_default();
            xml::find_child_ns(root, "Error", namespace).ok()?
        }
    };
    let namespace = fault.tag_name().namespace().unwrap_or_default();

    let code = xml::child_text_or(fault, "ErrorCode", namespace, "");
    let message = xml::child_text_ns(fault, "Message", namespace)
        .or_else(|_| xml::child_text_ns(fault, "ErrorDesc", namespace))
        .unwrap_or_default();
    let cause = xml::child_text_or(fault, "Cause", namespace, "");

    let mut record = ErrorRecord::new(if code.is_empty() { DEFAULT_ERROR_CODE } else { code.as_str() }, message)
        .with_cause(cause);
    if let Ok(sub_code) = xml::child_text_ns(fault, "ErrorSubCode", namespace) {
        record = record.with_sub_code(sub_code);
    }
    Some(record)
}

fn node_tree(node: Node<'_, '_>) -> ObjectTree {
    match xml::element_field(node) {
        Field::Tree(tree) => tree,
        leaf => ObjectTree::new().with(node.tag_name().name(), leaf),
    }
}

/// Outermost elements named `object_type`, in document order
fn collect_objects(root: Node<'_, '_>, object_type: &str) -> Vec<ObjectTree> {
    root.descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == object_type)
        .filter(|node| {
            node.ancestors()
                .skip(1)
                .all(|ancestor| ancestor.tag_name().name() != object_type)
        })
        .map(node_tree)
        .collect()
}

fn find_object<'a, 'input>(root: Node<'a, 'input>, object_type: &str) -> Option<Node<'a, 'input>> {
    root.descendants()
        .find(|node| node.is_element() && node.tag_name().name() == object_type)
}

pub fn interpret_xml(
    config: &DialectConfig,
    request: &OperationRequest,
    response: &HttpResponse,
    paginated: bool,
) -> Result<ResponseEnvelope> {
    check_status(response)?;

    let document = Document::parse(&response.body).map_err(|e| unparseable(response, e.to_string()))?;
    let root = document.root_element();

    if let Some(record) = xml_fault(root) {
        return Err(classify(response.status, record));
    }
    if !response.is_success() {
        return Err(classify(response.status, status_record(response)));
    }

    match request.action {
        Action::Read | Action::Search => {
            let items = collect_objects(root, &request.object_type);
            if !paginated {
                return Ok(ResponseEnvelope::collection(items));
            }

            let count = xml::child_text_ns(root, "Count", namespaces::ONLINE)
                .ok()
                .and_then(|count| count.parse().ok())
                .unwrap_or(items.len());
            log::debug!(
                "{} dialect page: count={} items={}",
                config.protocol,
                count,
                items.len()
            );
            Ok(ResponseEnvelope::page(items, count))
        }
        Action::Get => find_object(root, &request.object_type)
            .map(|node| ResponseEnvelope::object(node_tree(node)))
            .ok_or_else(|| not_found(request)),
        _ => {
            let tree = find_object(root, &request.object_type)
                .map(node_tree)
                .unwrap_or_else(|| node_tree(root));
            Ok(ResponseEnvelope::object(tree))
        }
    }
}

// JSON

fn json_fault(tree: &ObjectTree) -> Option<ErrorRecord> {
    let fault = tree.get_tree("Fault")?;
    let error = fault.get("Error").cloned().map(Field::into_trees)?.into_iter().next()?;

    let code = error
        .get_text("code")
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| DEFAULT_ERROR_CODE.to_string());
    let detail = error.get_text("Detail").unwrap_or_default();

    let mut record = match error.get_text("Message") {
        Some(message) => ErrorRecord::new(code, message).with_cause(detail),
        None => ErrorRecord::new(code, detail),
    };
    if let Some(cause) = error.get_text("cause") {
        record = record.with_cause(cause);
    }
    if let Some(sub_code) = error.get_text("ErrorSubCode") {
        record = record.with_sub_code(sub_code);
    }
    Some(record)
}

fn query_collections(query_response: &ObjectTree) -> Vec<ObjectTree> {
    query_response
        .iter()
        .filter(|(_, field)| matches!(field, Field::Tree(_) | Field::List(_)))
        .flat_map(|(_, field)| field.clone().into_trees())
        .collect()
}

pub fn interpret_json(request: &OperationRequest, response: &HttpResponse, paginated: bool) -> Result<ResponseEnvelope> {
    check_status(response)?;

    let tree = json::decode(&response.body).map_err(|e| unparseable(response, e.to_string()))?;

    if let Some(record) = json_fault(&tree) {
        return Err(classify(response.status, record));
    }
    if !response.is_success() {
        return Err(classify(response.status, status_record(response)));
    }

    let empty = ObjectTree::new();
    let query_response = tree.get_tree("QueryResponse").unwrap_or(&empty);

    match request.action {
        Action::Read | Action::Search => {
            let items = query_response
                .get(&request.object_type)
                .cloned()
                .map(Field::into_trees)
                .unwrap_or_default();
            if !paginated {
                return Ok(ResponseEnvelope::collection(items));
            }

            let count = query_response
                .get_text("maxResults")
                .and_then(|count| count.parse().ok())
                .unwrap_or(items.len());
            Ok(ResponseEnvelope::page(items, count))
        }
        Action::Query => Ok(ResponseEnvelope::collection(query_collections(query_response))),
        Action::Get => tree
            .get_tree(&request.object_type)
            .cloned()
            .map(ResponseEnvelope::object)
            .ok_or_else(|| not_found(request)),
        _ => {
            let object = tree.get_tree(&request.object_type).cloned().unwrap_or(tree);
            Ok(ResponseEnvelope::object(object))
        }
    }
}

// app center

/// Interpret a `PlatformResponse`; a non-zero `ErrorCode` is a failure
pub fn interpret_platform(response: &HttpResponse) -> Result<ObjectTree> {
    check_status(response)?;

    let document = Document::parse(&response.body).map_err(|e| unparseable(response, e.to_string()))?;
    let root = document.root_element();
    let namespace = root.tag_name().namespace().unwrap_or_default();

    let code = xml::child_text_or(root, "ErrorCode", namespace, "0");
    if code != "0" {
        let message = xml::child_text_or(root, "ErrorMessage", namespace, "");
        return Err(classify(response.status, ErrorRecord::new(code, message)));
    }
    if !response.is_success() {
        return Err(classify(response.status, status_record(response)));
    }

    Ok(node_tree(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body)
    }

    #[test]
    fn test_classify_markers() {
        let auth = classify(400, ErrorRecord::new("3200", "token rejected"));
        assert!(matches!(auth, QuickbooksError::AuthenticationFailure(_)));

        let marker = classify(400, ErrorRecord::new("22", "message AuthenticationFailed here"));
        assert!(matches!(marker, QuickbooksError::AuthenticationFailure(_)));

        let duplicate = classify(400, ErrorRecord::new("BAD_REQUEST", "dup").with_cause("-11202"));
        assert!(matches!(duplicate, QuickbooksError::DuplicateItem(_)));

        let sub = classify(400, ErrorRecord::new("500", "dup").with_sub_code("20345"));
        assert!(matches!(sub, QuickbooksError::DuplicateItem(_)));

        let missing = classify(400, ErrorRecord::new("610", "Object Not Found"));
        assert!(matches!(missing, QuickbooksError::NotFound(_)));

        match classify(400, ErrorRecord::new("2050", "bad field").with_cause("-1")) {
            QuickbooksError::Api(record) => assert_eq!(record.to_string(), "2050: -1 bad field"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_status_checks() {
        assert!(matches!(
            check_status(&response(401, "")),
            Err(QuickbooksError::AuthenticationFailure(_))
        ));
        assert!(matches!(
            check_status(&response(500, "<FaultInfo><ErrorCode>10000</ErrorCode></FaultInfo>")),
            Err(QuickbooksError::TryLater(_))
        ));
        assert!(check_status(&response(500, "boom")).is_ok());
        assert!(check_status(&response(200, "<ok/>")).is_ok());
    }

    #[test]
    fn test_online_fault_info() {
        let body = r#"<FaultInfo xmlns="http://www.intuit.com/sb/cdm/v2"><Message>Duplicate Name</Message><ErrorCode>BAD_REQUEST</ErrorCode><Cause>-11202</Cause></FaultInfo>"#;
        let document = Document::parse(body).unwrap();
        let record = xml_fault(document.root_element()).unwrap();
        assert_eq!(record.code, "BAD_REQUEST");
        assert_eq!(record.cause, "-11202");
        assert_eq!(record.message, "Duplicate Name");
    }

    #[test]
    fn test_desktop_error_uses_error_desc() {
        let body = r#"<RestResponse xmlns="http://www.intuit.com/sb/cdm/v2"><Error RequestId="1"><ErrorCode>-1</ErrorCode><ErrorDesc>desc</ErrorDesc><ErrorSubCode>20345</ErrorSubCode></Error></RestResponse>"#;
        let document = Document::parse(body).unwrap();
        let record = xml_fault(document.root_element()).unwrap();
        assert_eq!(record.message, "desc");
        assert_eq!(record.sub_code.as_deref(), Some("20345"));
    }

    #[test]
    fn test_fault_without_code_defaults() {
        let body = r#"<FaultInfo><Message>oops</Message></FaultInfo>"#;
        let document = Document::parse(body).unwrap();
        assert_eq!(xml_fault(document.root_element()).unwrap().code, DEFAULT_ERROR_CODE);
    }

    #[test]
    fn test_json_fault() {
        let body = r#"{"Fault":{"Error":[{"Message":"Invalid","Detail":"Field missing","code":"2020"}],"type":"ValidationFault"}}"#;
        let tree = json::decode(body).unwrap();
        let record = json_fault(&tree).unwrap();
        assert_eq!(record.to_string(), "2020: Field missing Invalid");
    }

    #[test]
    fn test_success_with_malformed_body_is_communication() {
        let request = OperationRequest::get("Customer", "1");
        let err = interpret_json(&request, &response(200, "<html>"), false).unwrap_err();
        match err {
            QuickbooksError::Communication { raw, .. } => assert_eq!(raw, "<html>"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_json_get_unwraps_object() {
        let request = OperationRequest::get("Customer", "1");
        let body = r#"{"Customer":{"Id":"1","DisplayName":"Acme"},"time":"2013-01-01"}"#;
        let tree = interpret_json(&request, &response(200, body), false).unwrap().into_object();
        assert_eq!(tree.get_text("DisplayName"), Some("Acme".to_string()));

        let err = interpret_json(&request, &response(200, r#"{"time":"x"}"#), false).unwrap_err();
        assert!(matches!(err, QuickbooksError::NotFound(_)));
    }

    #[test]
    fn test_json_single_item_page_is_sequence() {
        let request = OperationRequest::read("Customer");
        let body = r#"{"QueryResponse":{"Customer":{"Id":"1"},"maxResults":1}}"#;
        let envelope = interpret_json(&request, &response(200, body), true).unwrap();
        assert_eq!(envelope.page_count, Some(1));
        assert_eq!(envelope.into_items().len(), 1);
    }

    #[test]
    fn test_platform_response() {
        let ok = r#"<PlatformResponse xmlns="http://platform.intuit.com/api/v1"><ErrorMessage/><ErrorCode>0</ErrorCode><ServerTime>2013-01-01</ServerTime></PlatformResponse>"#;
        assert!(interpret_platform(&response(200, ok)).is_ok());

        let expired = r#"<PlatformResponse xmlns="http://platform.intuit.com/api/v1"><ErrorMessage>OAuth Token rejected</ErrorMessage><ErrorCode>270</ErrorCode></PlatformResponse>"#;
        assert!(matches!(
            interpret_platform(&response(200, expired)),
            Err(QuickbooksError::AuthenticationFailure(_))
        ));
    }
}
