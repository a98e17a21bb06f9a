//! Response shapes of the content API
//!
//! Only the envelope is typed here. Document `data` stays as JSON until the
//! content mapping validates it field by field.

use serde::{Deserialize, Serialize};

use super::without_access_token;
use crate::content::PageCursor;

/// One page of a document search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPage {
    pub results: Vec<RawDocument>,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

impl RawPage {
    /// Cursor of the next page, stripped of any access token
    pub fn cursor(&self) -> PageCursor {
        PageCursor::new(self.next_page.as_deref().map(without_access_token))
    }
}

/// A document as returned by the content API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type", default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub last_publication_date: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RawDocument {
    /// Best available name for error messages
    pub fn label(&self) -> String {
        self.uid
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("<unidentified>")
            .to_string()
    }
}

/// Entry point document listing the available refs
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiInfo {
    #[serde(default)]
    pub refs: Vec<ApiRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiRef {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "isMasterRef", default)]
    pub is_master: bool,
}

impl ApiInfo {
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.is_master)
            .map(|r| r.reference.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_are_required() {
        assert!(serde_json::from_str::<RawPage>(r#"{"next_page": null}"#).is_err());
        let page: RawPage = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(page.cursor().is_exhausted());
    }

    #[test]
    fn test_document_label() {
        let doc = RawDocument {
            id: Some("YF1".to_string()),
            ..RawDocument::default()
        };
        assert_eq!(doc.label(), "YF1");
        assert_eq!(RawDocument::default().label(), "<unidentified>");
    }

    #[test]
    fn test_master_ref() {
        let info: ApiInfo = serde_json::from_str(
            r#"{"refs":[{"id":"x","ref":"preview","isMasterRef":false},{"id":"master","ref":"YF2","isMasterRef":true}]}"#,
        )
        .unwrap();
        assert_eq!(info.master_ref(), Some("YF2"));
    }
}
