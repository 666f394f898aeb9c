//! API constants for the QuickBooks data services

/// Modern JSON protocol base (shared by both backends)
pub const V3_URL_BASE: &str = "https://quickbooks.api.intuit.com/v3";

/// Online XML protocol base
pub const ONLINE_XML_URL_BASE: &str = "https://qbo.sbfinance.intuit.com/resource";

/// Desktop gateway XML protocol base
pub const DESKTOP_XML_URL_BASE: &str = "https://services.intuit.com/sb";

/// App-center endpoints (menu, disconnect)
pub const APPCENTER_URL_BASE: &str = "https://appcenter.intuit.com/api/v1";

/// Version segment of XML resource URLs
pub const XML_API_VERSION: &str = "v2";

/// Fixed page size for paginated reads
pub const PAGE_SIZE: usize = 100;

/// Offering identifier carried in desktop request envelopes
pub const OFFERING_ID: &str = "ipp";

/// XML namespaces
pub mod namespaces {
    /// Core data model namespace shared by both XML dialects
    pub const CORE: &str = "http://www.intuit.com/sb/cdm/v2";

    /// Online-specific extensions (search results, faults)
    pub const ONLINE: &str = "http://www.intuit.com/sb/cdm/qbo";
}

/// Id domain tags attached through the `idDomain` attribute
pub mod id_domains {
    pub const ONLINE: &str = "QBO";
    pub const DESKTOP: &str = "QB";
}

/// Standard headers
pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const CONTENT_TYPE_XML: &str = "application/xml";
    pub const CONTENT_TYPE_TEXT_XML: &str = "text/xml";
    pub const ACCEPT: &str = "Accept";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const AUTHORIZATION: &str = "Authorization";
}

/// Backend markers used by the error classifier
pub mod markers {
    /// Backend code signalling a transient fault when returned with HTTP 500
    pub const TRY_LATER_CODE: &str = "10000";

    /// Error codes that mean the credential was rejected
    pub const AUTH_FAILURE_CODES: &[&str] = &["3200", "270"];

    /// Substring in fault messages that marks an authentication problem
    pub const AUTH_FAILURE_MESSAGE: &str = "AuthenticationFailed";

    pub const DUPLICATE_CAUSE: &str = "-11202";
    pub const DUPLICATE_SUB_CODE: &str = "20345";

    pub const NOT_FOUND_CODE: &str = "610";
}

/// Object types that always map to their lowercase name in URLs
pub const LOWERCASE_OBJECT_TYPES: &[&str] = &["CompanyMetaData", "Preferences"];

/// Build an XML resource URL: `{base}/{name}/v2/{tenant}`
pub fn xml_resource_endpoint(base_url: &str, url_name: &str, tenant_id: &str) -> String {
    format!("{}/{}/{}/{}", base_url, url_name, XML_API_VERSION, tenant_id)
}

/// Build an XML record URL: `{base}/{name}/v2/{tenant}/{id}`, id percent-encoded
pub fn xml_record_endpoint(base_url: &str, url_name: &str, tenant_id: &str, id: &str) -> String {
    format!(
        "{}/{}",
        xml_resource_endpoint(base_url, url_name, tenant_id),
        urlencoding::encode(id)
    )
}

/// Build a JSON record URL: `{base}/company/{tenant}/{type}/{id}`
pub fn company_record_endpoint(base_url: &str, tenant_id: &str, object_type: &str, id: &str) -> String {
    format!(
        "{}/{}",
        company_endpoint(base_url, tenant_id, object_type),
        urlencoding::encode(id)
    )
}

/// Build a JSON entity URL: `{base}/company/{tenant}/{type}`
pub fn company_endpoint(base_url: &str, tenant_id: &str, object_type: &str) -> String {
    format!("{}/company/{}/{}", base_url, tenant_id, object_type.to_lowercase())
}

/// Build the JSON query URL: `{base}/company/{tenant}/query`
pub fn query_endpoint(base_url: &str, tenant_id: &str) -> String {
    format!("{}/company/{}/query", base_url, tenant_id)
}

/// Build an app-center URL
pub fn appcenter_endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_shapes() {
        assert_eq!(
            xml_record_endpoint(ONLINE_XML_URL_BASE, "customer", "123", "5"),
            "https://qbo.sbfinance.intuit.com/resource/customer/v2/123/5"
        );
        assert_eq!(
            company_endpoint(V3_URL_BASE, "123", "Customer"),
            "https://quickbooks.api.intuit.com/v3/company/123/customer"
        );
        assert_eq!(
            xml_record_endpoint(DESKTOP_XML_URL_BASE, "item", "7", "QB 1/2"),
            "https://services.intuit.com/sb/item/v2/7/QB%201%2F2"
        );
        assert_eq!(
            company_record_endpoint(V3_URL_BASE, "123", "Invoice", "9"),
            "https://quickbooks.api.intuit.com/v3/company/123/invoice/9"
        );
        assert_eq!(
            appcenter_endpoint("https://appcenter.intuit.com/api/v1/", "account/appmenu"),
            "https://appcenter.intuit.com/api/v1/account/appmenu"
        );
    }
}
