//! Typed request arguments.
//!
//! # Invariants
//! - Every request is decoded exactly once from its argument map.
//! - Required ids are validated non-blank before any storage access.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// First page when `page` is omitted.
pub const DEFAULT_PAGE: i64 = 1;
/// All rows when `pageSize` is omitted.
pub const DEFAULT_PAGE_SIZE: i64 = -1;

#[derive(Debug)]
pub enum RequestError {
    Decode(serde_json::Error),
    BlankField(&'static str),
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "invalid arguments: {err}"),
            Self::BlankField(field) => write!(f, "argument `{field}` must not be blank"),
        }
    }
}

impl Error for RequestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            Self::BlankField(_) => None,
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value)
    }
}

/// Request decoded from a JSON argument map.
pub trait ApiRequest: DeserializeOwned {
    fn validate(&self) -> Result<(), RequestError>;

    fn decode(args: &serde_json::Value) -> Result<Self, RequestError> {
        let request = Self::deserialize(args)?;
        request.validate()?;
        Ok(request)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        return Err(RequestError::BlankField(field));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderSnapshotRequest {
    pub snapshot: String,
    pub id: String,
}

impl ApiRequest for RenderSnapshotRequest {
    fn validate(&self) -> Result<(), RequestError> {
        require("snapshot", &self.snapshot)?;
        require("id", &self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderHistoryRequest {
    pub id: String,
    pub created: String,
}

impl ApiRequest for RenderHistoryRequest {
    fn validate(&self) -> Result<(), RequestError> {
        require("id", &self.id)?;
        require("created", &self.created)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderAttributeViewRequest {
    pub id: String,
    #[serde(default, rename = "viewID")]
    pub view_id: Option<String>,
    /// Integral or fractional numbers; the fraction is truncated.
    #[serde(default)]
    pub page: Option<f64>,
    #[serde(default)]
    pub page_size: Option<f64>,
}

impl RenderAttributeViewRequest {
    pub fn page(&self) -> i64 {
        self.page.map_or(DEFAULT_PAGE, |page| page as i64)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size.map_or(DEFAULT_PAGE_SIZE, |size| size as i64)
    }
}

impl ApiRequest for RenderAttributeViewRequest {
    fn validate(&self) -> Result<(), RequestError> {
        require("id", &self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetAttributeViewKeysRequest {
    pub id: String,
}

impl ApiRequest for GetAttributeViewKeysRequest {
    fn validate(&self) -> Result<(), RequestError> {
        require("id", &self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetAttributeViewBlockAttrRequest {
    #[serde(rename = "avID")]
    pub av_id: String,
    #[serde(rename = "keyID")]
    pub key_id: String,
    #[serde(rename = "rowID")]
    pub row_id: String,
    #[serde(rename = "cellID")]
    pub cell_id: String,
    pub value: serde_json::Value,
}

impl ApiRequest for SetAttributeViewBlockAttrRequest {
    fn validate(&self) -> Result<(), RequestError> {
        require("avID", &self.av_id)?;
        require("keyID", &self.key_id)?;
        require("rowID", &self.row_id)?;
        require("cellID", &self.cell_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ApiRequest, RenderAttributeViewRequest, RequestError, SetAttributeViewBlockAttrRequest,
    };
    use serde_json::json;

    #[test]
    fn render_request_defaults_to_first_unbounded_page() {
        let request = RenderAttributeViewRequest::decode(&json!({"id": "av1"})).expect("decode");
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), -1);
        assert!(request.view_id.is_none());

        let request = RenderAttributeViewRequest::decode(
            &json!({"id": "av1", "viewID": "v2", "page": 2, "pageSize": 4}),
        )
        .expect("decode");
        assert_eq!(request.view_id.as_deref(), Some("v2"));
        assert_eq!((request.page(), request.page_size()), (2, 4));
    }

    #[test]
    fn render_request_truncates_float_pagination() {
        let request =
            RenderAttributeViewRequest::decode(&json!({"id": "av1", "page": 2.0, "pageSize": 4.7}))
                .expect("decode");
        assert_eq!((request.page(), request.page_size()), (2, 4));

        let request = RenderAttributeViewRequest::decode(&json!({"id": "av1", "pageSize": -1.0}))
            .expect("decode");
        assert_eq!(request.page_size(), -1);
    }

    #[test]
    fn set_attr_request_rejects_blank_ids() {
        let err = SetAttributeViewBlockAttrRequest::decode(&json!({
            "avID": "av1", "keyID": " ", "rowID": "b1", "cellID": "c1", "value": "x"
        }))
        .expect_err("blank key id");
        assert!(matches!(err, RequestError::BlankField("keyID")));
    }

    #[test]
    fn missing_fields_fail_decoding() {
        let err = SetAttributeViewBlockAttrRequest::decode(&json!({"avID": "av1"}))
            .expect_err("missing ids");
        assert!(matches!(err, RequestError::Decode(_)));
    }
}
