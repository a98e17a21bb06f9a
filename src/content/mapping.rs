//! Shaping provider documents into view models
//!
//! Every required field is checked here; a document that lacks one fails
//! with a [`ContentError`] naming the document and the field instead of
//! leaking a blank value into a page.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{ContentError, ContentSection, PostDetail, PostSummary, RichText};
use crate::helpers::{parse_timestamp, DateFormatter};
use crate::provider::RawDocument;

struct Fields<'a> {
    document: String,
    data: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn of(doc: &'a RawDocument) -> Result<Self, ContentError> {
        let document = doc.label();
        let data = doc.data.as_object().ok_or_else(|| ContentError::MissingField {
            document: document.clone(),
            field: "data".to_string(),
        })?;
        Ok(Self { document, data })
    }

    fn missing(&self, field: &str) -> ContentError {
        ContentError::MissingField {
            document: self.document.clone(),
            field: field.to_string(),
        }
    }

    fn invalid(&self, field: &str, reason: &str) -> ContentError {
        ContentError::InvalidField {
            document: self.document.clone(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    fn string(&self, field: &str) -> Result<String, ContentError> {
        match self.data.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) | None => Err(self.missing(field)),
            Some(_) => Err(self.invalid(field, "expected text")),
        }
    }
}

fn uid(doc: &RawDocument) -> Result<String, ContentError> {
    doc.uid
        .clone()
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| ContentError::MissingField {
            document: doc.label(),
            field: "uid".to_string(),
        })
}

/// Parse `first_publication_date`; absent stays `None`, garbage is an error
fn publication_date(doc: &RawDocument) -> Result<Option<DateTime<Utc>>, ContentError> {
    match doc.first_publication_date.as_deref() {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| ContentError::InvalidDate {
                document: doc.label(),
                value: raw.to_string(),
            }),
    }
}

impl PostSummary {
    /// Map a provider document into a list entry
    pub fn from_document(doc: &RawDocument, dates: &DateFormatter) -> Result<Self, ContentError> {
        let fields = Fields::of(doc)?;
        let publication_date = publication_date(doc)?;

        Ok(Self {
            id: uid(doc)?,
            date: dates.format(publication_date.as_ref()),
            publication_date,
            title: fields.string("title")?,
            subtitle: fields.string("subtitle")?,
            author: fields.string("author")?,
        })
    }
}

impl PostDetail {
    /// Map a provider document into a full post
    pub fn from_document(doc: &RawDocument) -> Result<Self, ContentError> {
        let fields = Fields::of(doc)?;

        let banner_url = match fields.data.get("banner") {
            Some(Value::Object(banner)) => match banner.get("url") {
                Some(Value::String(url)) => url.clone(),
                _ => return Err(fields.missing("banner.url")),
            },
            Some(Value::Null) | None => return Err(fields.missing("banner")),
            Some(_) => return Err(fields.invalid("banner", "expected an image")),
        };

        let content = match fields.data.get("content") {
            Some(Value::Array(sections)) => sections
                .iter()
                .enumerate()
                .map(|(i, section)| content_section(&fields, i, section))
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::Null) | None => return Err(fields.missing("content")),
            Some(_) => return Err(fields.invalid("content", "expected a list of sections")),
        };

        Ok(Self {
            id: uid(doc)?,
            publication_date: publication_date(doc)?,
            title: fields.string("title")?,
            author: fields.string("author")?,
            banner_url,
            content,
        })
    }
}

fn content_section(
    fields: &Fields<'_>,
    index: usize,
    section: &Value,
) -> Result<ContentSection, ContentError> {
    let heading_field = format!("content[{}].heading", index);
    let body_field = format!("content[{}].body", index);

    let section = section
        .as_object()
        .ok_or_else(|| fields.invalid(&format!("content[{}]", index), "expected an object"))?;

    let heading = match section.get("heading") {
        Some(Value::String(s)) => s.clone(),
        // an empty heading comes back as null from the editor
        Some(Value::Null) => String::new(),
        None => return Err(fields.missing(&heading_field)),
        Some(_) => return Err(fields.invalid(&heading_field, "expected text")),
    };

    let body = match section.get("body") {
        Some(value @ Value::Array(_)) => serde_json::from_value::<RichText>(value.clone())
            .map_err(|e| fields.invalid(&body_field, &e.to_string()))?,
        Some(Value::Null) | None => return Err(fields.missing(&body_field)),
        Some(_) => return Err(fields.invalid(&body_field, "expected rich text")),
    };

    Ok(ContentSection { heading, body })
}
