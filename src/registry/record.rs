//! Records as stored in the patient registry.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Sparse mapping from field name to value; an absent key means "not recorded".
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(#[serde(deserialize_with = "from_json_values")] IndexMap<String, String>);

impl Fields {
    /// Raw value of `name`, `Some("")` if recorded but empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of `name` if recorded and non-empty.
    pub fn get_nonempty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    /// Owned copy of the raw value of `name`.
    pub fn get_owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_owned)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.shift_remove(name)
    }

    /// Iterate over all recorded fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite all fields present in `other`.
    pub fn update(&mut self, other: &Fields) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Deserialize field values from arbitrary JSON scalars.
///
/// Numbers are kept in their decimal form, booleans become `1`/`0`, arrays are
/// joined with `|` and `null` values are dropped (i.e., not recorded).
fn from_json_values<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, serde_json::Value> = Deserialize::deserialize(deserializer)?;
    let mut result = IndexMap::with_capacity(raw.len());
    for (name, value) in raw {
        if let Some(value) = json_to_string(value) {
            result.insert(name, value);
        }
    }
    Ok(result)
}

fn json_to_string(value: serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(json_to_string)
                .collect::<Vec<_>>()
                .join("|"),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// The fields of one patient (the `PatientClass` properties).
pub type PatientRecord = Fields;

/// One reported variant of a patient (a `ClinVarVariant` object).
pub type VariantObservation = Fields;

/// Kind of a relative record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelativeType {
    /// The owning patient is a child of the relative.
    Child,
    /// The owning patient is a parent of the relative.
    Parent,
    /// Any other relationship, kept verbatim.
    Other(String),
}

impl From<String> for RelativeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "child" => RelativeType::Child,
            "parent" => RelativeType::Parent,
            _ => RelativeType::Other(value),
        }
    }
}

impl From<RelativeType> for String {
    fn from(value: RelativeType) -> Self {
        match value {
            RelativeType::Child => "child".to_string(),
            RelativeType::Parent => "parent".to_string(),
            RelativeType::Other(other) => other,
        }
    }
}

/// A relative record attached to a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct Relative {
    /// External ID of the other patient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_of: Option<String>,
    /// How the owning patient relates to the other patient.
    pub relative_type: RelativeType,
}
