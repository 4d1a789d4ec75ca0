//! Post metadata decoding

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{Error, Result};

/// Front-matter fields of a post.
///
/// Keys are read exactly as authors write them (`Title`, `Slug`, ...);
/// templates see the snake_case field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMetadata {
    #[serde(rename(deserialize = "Title"))]
    pub title: String,
    #[serde(rename(deserialize = "Slug"))]
    pub slug: String,
    #[serde(rename(deserialize = "Date"))]
    pub date: String,
    #[serde(rename(deserialize = "Description"))]
    pub description: String,
    #[serde(rename(deserialize = "Order"))]
    pub order: i64,

    // SEO
    #[serde(rename(deserialize = "MetaDescription"))]
    pub meta_description: String,
    #[serde(rename(deserialize = "MetaPropertyTitle"))]
    pub meta_property_title: String,
    #[serde(rename(deserialize = "MetaPropertyDescription"))]
    pub meta_property_description: String,
    #[serde(rename(deserialize = "MetaOgURL"))]
    pub meta_og_url: String,

    pub author: Author,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl PostMetadata {
    /// Parse the `Date` field
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date_string(&self.date)
    }
}

/// Decode a metadata block.
///
/// An empty block (or one holding only comments) is the zero value. Unknown
/// keys are ignored, missing keys keep their zero value.
pub fn decode(block: &str) -> Result<PostMetadata> {
    if block.trim().is_empty() {
        return Ok(PostMetadata::default());
    }

    // Shape check first; fields are then read from the text so that scalars
    // like `Title: 2024` still land in string fields
    let value: Value = serde_yaml::from_str(block).map_err(malformed)?;
    match value {
        Value::Null => Ok(PostMetadata::default()),
        Value::Mapping(_) => serde_yaml::from_str(block).map_err(malformed),
        _ => Err(Error::Malformed {
            source_id: String::new(),
            message: "front-matter must be a mapping of keys to values".to_string(),
        }),
    }
}

fn malformed(err: serde_yaml::Error) -> Error {
    Error::Malformed {
        source_id: String::new(),
        message: err.to_string(),
    }
}

/// Parse a date string in the formats authors commonly use
fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%d %B %Y"];
    for fmt in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}
