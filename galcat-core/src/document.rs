// src/document.rs
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{GalcatError, Result};

/// Field that identifies a catalog record unless configured otherwise
pub const DEFAULT_ID_FIELD: &str = "name";

/// One sourced measurement of a multi-valued field.
///
/// Parsing is lenient: `value` and `distribution` may both be present or
/// both be missing. The validator reports entries carrying neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_upper: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_lower: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<f64>>,

    /// Keys outside the known entry shape, kept verbatim
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ValueEntry {
    /// Entry holding a single measured value
    pub fn new(value: f64) -> Self {
        ValueEntry {
            value: Some(value),
            ..Default::default()
        }
    }

    /// Entry holding samples instead of a point value
    pub fn from_distribution(samples: Vec<f64>) -> Self {
        ValueEntry {
            distribution: Some(samples),
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_best(mut self, best: bool) -> Self {
        self.best = Some(if best { 1 } else { 0 });
        self
    }

    pub fn with_errors(mut self, upper: f64, lower: f64) -> Self {
        self.error_upper = Some(upper);
        self.error_lower = Some(lower);
        self
    }

    /// Marked as the preferred entry of its field
    pub fn is_best(&self) -> bool {
        self.best == Some(1)
    }

    /// Carries a value or a distribution
    pub fn has_measurement(&self) -> bool {
        self.value.is_some() || self.distribution.is_some()
    }

    /// Reference key, ignoring blank keys
    pub fn reference_key(&self) -> Option<&str> {
        self.reference.as_deref().filter(|r| !r.trim().is_empty())
    }

    /// Sub-field lookup by name, as addressed by a dotted query path
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "value" => self.value.map(Value::from),
            "error_upper" => self.error_upper.map(Value::from),
            "error_lower" => self.error_lower.map(Value::from),
            "unit" => self.unit.clone().map(Value::String),
            "reference" => self.reference.clone().map(Value::String),
            "best" => self.best.map(Value::from),
            "distribution" => self
                .distribution
                .as_ref()
                .map(|samples| Value::Array(samples.iter().copied().map(Value::from).collect())),
            other => self.extra.get(other).cloned(),
        }
    }

    /// JSON object of the populated sub-fields, known keys first
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(ENTRY_KEYS.len() + self.extra.len());
        for key in ENTRY_KEYS {
            if let Some(v) = self.field(key) {
                map.insert(key.to_string(), v);
            }
        }
        for (key, v) in &self.extra {
            map.insert(key.clone(), v.clone());
        }
        Value::Object(map)
    }
}

const ENTRY_KEYS: [&str; 7] = ["value", "error_upper", "error_lower", "unit", "reference", "best", "distribution"];

/// Content of one document slot, resolved once at parse time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(Value),
    Entries(Vec<ValueEntry>),
}

impl FieldValue {
    /// Classify a JSON value: arrays of objects (or empty arrays) hold entries,
    /// everything else is a scalar slot.
    pub fn parse(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) if items.iter().all(Value::is_object) => {
                let mut entries = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let entry = ValueEntry::deserialize(item).map_err(|e| {
                        GalcatError::InvalidDocument(format!("{}[{}]: {}", field, i, e))
                    })?;
                    entries.push(entry);
                }
                Ok(FieldValue::Entries(entries))
            }
            other => Ok(FieldValue::Scalar(other.clone())),
        }
    }

    pub fn render(&self) -> Value {
        match self {
            FieldValue::Scalar(v) => v.clone(),
            FieldValue::Entries(entries) => Value::Array(
                entries
                    .iter()
                    .map(ValueEntry::to_value)
                    .collect(),
            ),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::Entries(_) => None,
        }
    }

    pub fn as_entries(&self) -> Option<&[ValueEntry]> {
        match self {
            FieldValue::Entries(entries) => Some(entries),
            FieldValue::Scalar(_) => None,
        }
    }

    pub fn as_entries_mut(&mut self) -> Option<&mut Vec<ValueEntry>> {
        match self {
            FieldValue::Entries(entries) => Some(entries),
            FieldValue::Scalar(_) => None,
        }
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, FieldValue::Entries(_))
    }
}

impl From<Vec<ValueEntry>> for FieldValue {
    fn from(entries: Vec<ValueEntry>) -> Self {
        FieldValue::Entries(entries)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

/// Catalog record: scalar fields plus multi-valued measurement fields,
/// in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: IndexMap<String, FieldValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object into a document
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| GalcatError::InvalidDocument("document must be a JSON object".into()))?;

        let mut fields = IndexMap::with_capacity(map.len());
        for (key, val) in map {
            fields.insert(key.clone(), FieldValue::parse(key, val)?);
        }
        Ok(Document { fields })
    }

    /// Render back to a plain JSON object; inverse of [`Document::from_value`]
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len());
        for (key, field) in &self.fields {
            map.insert(key.clone(), field.render());
        }
        Value::Object(map)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Pretty-printed JSON, the on-disk form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(field)
    }

    /// Set a field; an existing field keeps its position
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Entries of a multi-valued field
    pub fn entries(&self, field: &str) -> Option<&[ValueEntry]> {
        self.fields.get(field).and_then(FieldValue::as_entries)
    }

    /// Append an entry, creating the field when missing
    pub fn push_entry(&mut self, field: &str, entry: ValueEntry) -> Result<()> {
        match self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| FieldValue::Entries(Vec::new()))
        {
            FieldValue::Entries(entries) => {
                entries.push(entry);
                Ok(())
            }
            FieldValue::Scalar(_) => Err(GalcatError::InvalidDocument(format!(
                "field '{}' is a scalar and cannot hold value entries",
                field
            ))),
        }
    }

    /// Value of the identifying field
    pub fn identifier(&self, id_field: &str) -> Option<&Value> {
        self.get(id_field).and_then(FieldValue::as_scalar)
    }

    /// Identifier as text, `None` when absent or blank
    pub fn identifier_str(&self, id_field: &str) -> Option<&str> {
        self.identifier(id_field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.to_value()
    }
}

impl TryFrom<Value> for Document {
    type Error = GalcatError;

    fn try_from(value: Value) -> Result<Self> {
        Document::from_value(&value)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.fields.iter())
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Document::from_value(&value).map_err(D::Error::custom)
    }
}
