//! SharePoint Online REST client.
//!
//! Authentication follows the user/password SAML flow: the STS issues a
//! security token for the site origin, the token is posted to the sign-in
//! form, and the returned `FedAuth`/`rtFa` cookies authorize REST calls.
//! List and file payloads are requested in verbose OData so nested objects
//! and navigation links can be told apart during decoding.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Client, Url, redirect};
use serde_json::{Map, Value};
use spgraph_store::models::{LibraryItem, PropertyBag, PropertyValue};
use tracing::{debug, info};

use super::{DocumentLibrary, LibraryError, error_body};

pub const DEFAULT_STS_URL: &str = "https://login.microsoftonline.com/extSTS.srf";

const ODATA_VERBOSE: &str = "application/json;odata=verbose";
const SIGN_IN_PATH: &str = "/_forms/default.aspx?wa=wsignin1.0";
const AUTH_COOKIES: [&str; 2] = ["FedAuth", "rtFa"];
const METADATA_KEY: &str = "__metadata";
const DEFERRED_KEY: &str = "__deferred";

/// Connection settings for a SharePoint document library.
#[derive(Debug, Clone)]
pub struct SharePointConfig {
    pub site_url: String,
    pub username: String,
    pub password: String,
    pub library_name: String,
    pub sts_url: String,
    pub timeout: Duration,
}

pub struct SharePointClient {
    client: Client,
    config: SharePointConfig,
    site_url: String,
    origin: String,
}

impl SharePointClient {
    /// Builds the client.
    ///
    /// # Errors
    /// Returns `LibraryError::InvalidUrl` if the site URL does not parse, or
    /// `LibraryError::Http` if the HTTP client cannot be built.
    pub fn new(config: SharePointConfig) -> Result<Self, LibraryError> {
        let parsed = Url::parse(&config.site_url)
            .map_err(|err| LibraryError::InvalidUrl(format!("{}: {err}", config.site_url)))?;
        let origin = parsed.origin().ascii_serialization();
        let site_url = config.site_url.trim_end_matches('/').to_string();
        // The sign-in response sets cookies on a redirect; follow nothing.
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            config,
            site_url,
            origin,
        })
    }

    /// Authenticates and returns a session carrying the auth cookies.
    ///
    /// # Errors
    /// Returns `LibraryError` if the token exchange or sign-in fails.
    pub async fn connect(&self) -> Result<SharePointSession<'_>, LibraryError> {
        let token = self.request_security_token().await?;
        let cookie = self.sign_in(&token).await?;
        debug!(site = %self.site_url, "signed in to document library");
        Ok(SharePointSession {
            client: self,
            cookie,
        })
    }

    async fn request_security_token(&self) -> Result<String, LibraryError> {
        let envelope = security_token_request(
            &self.config.username,
            &self.config.password,
            &self.origin,
            &self.config.sts_url,
        );
        let response = self
            .client
            .post(&self.config.sts_url)
            .header(CONTENT_TYPE, "application/soap+xml; charset=utf-8")
            .body(envelope)
            .send()
            .await?;
        // Faults arrive with a 500 status and a SOAP body worth reporting.
        let body = response.text().await?;
        extract_security_token(&body)
    }

    async fn sign_in(&self, token: &str) -> Result<String, LibraryError> {
        let url = format!("{}{SIGN_IN_PATH}", self.origin);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(token.to_string())
            .send()
            .await?;

        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(cookie_pair)
            .filter(|pair| AUTH_COOKIES.iter().any(|name| pair.starts_with(&format!("{name}="))))
            .collect();

        if !cookies.iter().any(|pair| pair.starts_with("FedAuth=")) {
            return Err(LibraryError::Auth(format!(
                "sign-in returned {} without a FedAuth cookie",
                response.status()
            )));
        }
        Ok(cookies.join("; "))
    }

    fn list_url(&self) -> String {
        format!(
            "{}/_api/web/lists/GetByTitle('{}')",
            self.site_url,
            urlencoding::encode(&self.config.library_name.replace('\'', "''"))
        )
    }
}

#[async_trait]
impl DocumentLibrary for SharePointClient {
    async fn fetch_items(&self) -> Result<Vec<LibraryItem>, LibraryError> {
        let session = self.connect().await?;
        let ids = session.list_item_ids().await?;
        info!(
            library = %self.config.library_name,
            items = ids.len(),
            "listed document library items"
        );

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let properties = session.load_file_properties(id).await?;
            items.push(LibraryItem::new(id.to_string(), properties));
        }
        Ok(items)
    }
}

/// An authenticated SharePoint session.
pub struct SharePointSession<'a> {
    client: &'a SharePointClient,
    cookie: String,
}

impl SharePointSession<'_> {
    async fn get_verbose(&self, url: &str) -> Result<Map<String, Value>, LibraryError> {
        let response = self
            .client
            .client
            .get(url)
            .header(ACCEPT, ODATA_VERBOSE)
            .header(COOKIE, &self.cookie)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LibraryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: error_body(response).await,
            });
        }

        let mut payload: Value = response.json().await?;
        match payload.get_mut("d").map(Value::take) {
            Some(Value::Object(map)) => Ok(map),
            _ => Err(LibraryError::Decode(format!("missing `d` object in response from {url}"))),
        }
    }

    /// Lists every item id in the library, following `__next` paging links.
    ///
    /// # Errors
    /// Returns `LibraryError` if a page request fails or an item lacks an id.
    pub async fn list_item_ids(&self) -> Result<Vec<i64>, LibraryError> {
        let mut ids = Vec::new();
        let mut next = Some(format!("{}/items?$select=Id", self.client.list_url()));
        while let Some(url) = next.take() {
            let page = self.get_verbose(&url).await?;
            let results = page
                .get("results")
                .and_then(Value::as_array)
                .ok_or_else(|| LibraryError::Decode("item page has no results array".to_string()))?;
            for item in results {
                let id = item
                    .get("Id")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| LibraryError::Decode("list item without an Id".to_string()))?;
                ids.push(id);
            }
            next = page.get("__next").and_then(Value::as_str).map(str::to_string);
        }
        Ok(ids)
    }

    /// Loads the file properties of one list item.
    ///
    /// # Errors
    /// Returns `LibraryError` if the request fails.
    pub async fn load_file_properties(&self, item_id: i64) -> Result<PropertyBag, LibraryError> {
        let url = format!("{}/items({item_id})/File", self.client.list_url());
        let entity = self.get_verbose(&url).await?;
        Ok(decode_entity(&entity))
    }
}

/// Decodes a verbose OData entity into a property bag.
///
/// `__metadata` is dropped, deferred navigation properties are skipped since
/// they were never loaded, objects carrying their own `__metadata` become
/// nested bags, and legacy `/Date(ms)/` strings become formatted timestamps.
#[must_use]
pub fn decode_entity(entity: &Map<String, Value>) -> PropertyBag {
    entity
        .iter()
        .filter(|(key, _)| key.as_str() != METADATA_KEY)
        .filter_map(|(key, value)| decode_value(value).map(|value| (key.clone(), value)))
        .collect()
}

fn decode_value(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::Object(map) if map.contains_key(DEFERRED_KEY) => None,
        Value::Object(map) if map.contains_key(METADATA_KEY) => {
            Some(PropertyValue::Nested(decode_entity(map)))
        }
        Value::String(raw) => Some(
            parse_odata_date(raw)
                .map_or_else(|| PropertyValue::Json(value.clone()), PropertyValue::Opaque),
        ),
        _ => Some(PropertyValue::Json(value.clone())),
    }
}

fn parse_odata_date(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix("/Date(")?.strip_suffix(")/")?;
    let end = inner
        .get(1..)
        .and_then(|rest| rest.find(['+', '-']))
        .map_or(inner.len(), |offset| offset + 1);
    let millis = inner[..end].parse::<i64>().ok()?;
    DateTime::from_timestamp_millis(millis).map(|stamp| stamp.naive_utc().to_string())
}

fn cookie_pair(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    pair.contains('=').then(|| pair.to_string())
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn security_token_request(username: &str, password: &str, endpoint: &str, sts_url: &str) -> String {
    let username = xml_escape(username);
    let password = xml_escape(password);
    let endpoint = xml_escape(endpoint);
    let sts_url = xml_escape(sts_url);
    format!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://www.w3.org/2005/08/addressing" xmlns:u="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
  <s:Header>
    <a:Action s:mustUnderstand="1">http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue</a:Action>
    <a:ReplyTo><a:Address>http://www.w3.org/2005/08/addressing/anonymous</a:Address></a:ReplyTo>
    <a:To s:mustUnderstand="1">{sts_url}</a:To>
    <o:Security s:mustUnderstand="1" xmlns:o="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">
      <o:UsernameToken>
        <o:Username>{username}</o:Username>
        <o:Password>{password}</o:Password>
      </o:UsernameToken>
    </o:Security>
  </s:Header>
  <s:Body>
    <t:RequestSecurityToken xmlns:t="http://schemas.xmlsoap.org/ws/2005/02/trust">
      <wsp:AppliesTo xmlns:wsp="http://schemas.xmlsoap.org/ws/2004/09/policy">
        <a:EndpointReference><a:Address>{endpoint}</a:Address></a:EndpointReference>
      </wsp:AppliesTo>
      <t:KeyType>http://schemas.xmlsoap.org/ws/2005/05/identity/NoProofKey</t:KeyType>
      <t:RequestType>http://schemas.xmlsoap.org/ws/2005/02/trust/Issue</t:RequestType>
      <t:TokenType>urn:oasis:names:tc:SAML:1.0:assertion</t:TokenType>
    </t:RequestSecurityToken>
  </s:Body>
</s:Envelope>"#
    )
}

fn extract_security_token(body: &str) -> Result<String, LibraryError> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|err| LibraryError::Auth(format!("unreadable token response: {err}")))?;

    if let Some(token) = doc
        .descendants()
        .find(|node| node.has_tag_name("BinarySecurityToken"))
        .and_then(|node| node.text())
    {
        return Ok(token.trim().to_string());
    }

    // Prefer the detailed `psf:text` over the generic `S:Reason/S:Text`.
    let reason = ["text", "Text"]
        .iter()
        .find_map(|tag| {
            doc.descendants()
                .find(|node| node.has_tag_name(*tag))
                .and_then(|node| node.text())
        })
        .map_or_else(|| "no security token in response".to_string(), str::to_string);
    Err(LibraryError::Auth(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn decode_entity_classifies_verbose_odata() {
        let entity = object(json!({
            "__metadata": {"type": "SP.File"},
            "Author": {"__deferred": {"uri": "https://tenant/_api/Web/GetFileById/Author"}},
            "Name": "report.docx",
            "Length": "2048",
            "MajorVersion": 3,
            "TimeCreated": "/Date(1700000000000)/",
            "Location": {
                "__metadata": {"type": "SP.FieldUrlValue"},
                "Url": "https://x",
                "Description": "x"
            },
            "Tags": {"results": ["a", "b"]}
        }));

        let bag = decode_entity(&entity);

        assert!(!bag.contains_key("__metadata"));
        assert!(!bag.contains_key("Author"));
        assert_eq!(bag.get("Name"), Some(&PropertyValue::Json(json!("report.docx"))));
        assert_eq!(bag.get("MajorVersion"), Some(&PropertyValue::Json(json!(3))));
        assert_eq!(
            bag.get("TimeCreated"),
            Some(&PropertyValue::Opaque("2023-11-14 22:13:20".to_string()))
        );
        match bag.get("Location") {
            Some(PropertyValue::Nested(nested)) => {
                assert_eq!(nested.get("Url"), Some(&PropertyValue::Json(json!("https://x"))));
                assert!(!nested.contains_key("__metadata"));
            }
            other => panic!("expected nested bag, got {other:?}"),
        }
        assert_eq!(
            bag.get("Tags"),
            Some(&PropertyValue::Json(json!({"results": ["a", "b"]})))
        );
    }

    #[test]
    fn odata_dates_accept_offsets_and_reject_other_text() {
        assert_eq!(parse_odata_date("/Date(0+0000)/").as_deref(), Some("1970-01-01 00:00:00"));
        assert_eq!(parse_odata_date("/Date(-1000)/").as_deref(), Some("1969-12-31 23:59:59"));
        assert_eq!(parse_odata_date("2024-01-01T00:00:00Z"), None);
        assert_eq!(parse_odata_date("/Date(soon)/"), None);
    }

    #[test]
    fn token_request_escapes_credentials() {
        let envelope = security_token_request(
            "a&b@x.com",
            "p<w>'\"",
            "https://t.sharepoint.com",
            DEFAULT_STS_URL,
        );
        assert!(envelope.contains("<o:Username>a&amp;b@x.com</o:Username>"));
        assert!(envelope.contains("<o:Password>p&lt;w&gt;&apos;&quot;</o:Password>"));
        assert!(roxmltree::Document::parse(&envelope).is_ok());
    }

    #[test]
    fn extracts_token_or_fault_reason() {
        let ok = r#"<S:Envelope xmlns:S="http://www.w3.org/2003/05/soap-envelope" xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd"><S:Body><wsse:BinarySecurityToken Id="Compact0">t=abc&amp;p=</wsse:BinarySecurityToken></S:Body></S:Envelope>"#;
        assert_eq!(extract_security_token(ok).expect("token"), "t=abc&p=");

        let fault = r#"<S:Envelope xmlns:S="http://www.w3.org/2003/05/soap-envelope" xmlns:psf="http://schemas.microsoft.com/Passport/SoapServices/SOAPFault"><S:Body><S:Fault><S:Detail><psf:error><psf:internalerror><psf:text>Invalid password.</psf:text></psf:internalerror></psf:error></S:Detail></S:Fault></S:Body></S:Envelope>"#;
        match extract_security_token(fault) {
            Err(LibraryError::Auth(reason)) => assert_eq!(reason, "Invalid password."),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn cookie_pair_keeps_name_and_value_only() {
        assert_eq!(
            cookie_pair("FedAuth=77u/PD94; path=/; secure; HttpOnly").as_deref(),
            Some("FedAuth=77u/PD94")
        );
        assert_eq!(cookie_pair("garbage"), None);
    }

    #[test]
    fn list_url_quotes_library_title() {
        let client = SharePointClient::new(SharePointConfig {
            site_url: "https://tenant.sharepoint.com/sites/team/".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            library_name: "Bob's Docs".to_string(),
            sts_url: DEFAULT_STS_URL.to_string(),
            timeout: Duration::from_secs(5),
        })
        .expect("client should build");
        assert_eq!(
            client.list_url(),
            "https://tenant.sharepoint.com/sites/team/_api/web/lists/GetByTitle('Bob%27%27s%20Docs')"
        );
        assert_eq!(client.origin, "https://tenant.sharepoint.com");
    }
}
