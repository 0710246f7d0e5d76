//! Patient field schema and value normalization for imports.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Type of a patient property as declared by the registry.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
pub enum PropertyType {
    Date,
    Boolean,
    Number,
    StaticList,
    #[default]
    String,
    TextArea,
    /// Any type without special handling; treated like `String`.
    #[serde(other)]
    Other,
}

/// Metadata of a single patient property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMeta {
    /// The property type.
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    /// For numbers, one of `integer`, `long`, `float`, `double`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_type: Option<String>,
    /// For static lists, mapping from stored key to display label.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, String>,
    /// Optional regular expression that the whole value must match.
    #[serde(
        default,
        rename = "validationRegExp",
        skip_serializing_if = "Option::is_none"
    )]
    pub validation_regexp: Option<String>,
}

impl PropertyMeta {
    /// Normalize a raw CSV cell into the stored representation.
    ///
    /// Returns `None` if the value is not acceptable for this property.
    pub fn normalize(&self, value: &str) -> Option<String> {
        let value = value.trim();
        match self.property_type {
            PropertyType::Date => {
                crate::common::parse_date(value).map(|date| date.format("%Y-%m-%d").to_string())
            }
            PropertyType::Boolean => match value.to_lowercase().as_str() {
                "t" | "true" | "y" | "yes" | "1" => Some("1".to_string()),
                "f" | "false" | "n" | "no" | "0" => Some("0".to_string()),
                _ => None,
            },
            PropertyType::Number => match self.number_type.as_deref() {
                Some("integer") | Some("long") => {
                    value.parse::<i64>().ok().map(|n| n.to_string())
                }
                _ => value
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(|n| n.to_string()),
            },
            PropertyType::StaticList => {
                if self.values.is_empty() {
                    return Some(value.to_string());
                }
                let lower = value.to_lowercase();
                self.values
                    .iter()
                    .find(|(key, label)| lower == key.to_lowercase() || lower == label.to_lowercase())
                    .map(|(key, _)| key.clone())
            }
            PropertyType::String | PropertyType::TextArea | PropertyType::Other => {
                match self.validation_regexp.as_deref().filter(|re| !re.is_empty()) {
                    Some(re) => {
                        // An invalid expression cannot be satisfied.
                        let re = regex::Regex::new(&format!("^(?:{})$", re)).ok()?;
                        re.is_match(value).then(|| value.to_string())
                    }
                    None => Some(value.to_string()),
                }
            }
        }
    }
}

/// Ordered property name to metadata mapping.
pub type Properties = IndexMap<String, PropertyMeta>;
