use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::models::Registration;

/// One field of a job's player-profile form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub name: String,
    #[serde(default)]
    pub db_column: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub admin_only: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl FieldMetadata {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Admin-only and hidden fields never accept client input
    pub fn is_client_writable(&self) -> bool {
        !self.admin_only && !self.hidden
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadataSet {
    #[serde(default)]
    pub fields: Vec<FieldMetadata>,
}

impl FieldMetadataSet {
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }

    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name.trim()))
    }
}

type Setter = fn(&mut Registration, &Value) -> bool;

/// A registration property that form input may write
pub struct WritableField {
    pub property: &'static str,
    setter: Setter,
}

impl WritableField {
    const fn new(property: &'static str, setter: Setter) -> Self {
        Self { property, setter }
    }

    /// Returns false when the value cannot be coerced to the property's type
    pub fn apply(&self, registration: &mut Registration, value: &Value) -> bool {
        (self.setter)(registration, value)
    }
}

/// Case, underscores, dashes and spaces are not significant in column names
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn coerce_text(value: &Value) -> Option<Option<String>> {
    match value {
        Value::Null => Some(None),
        Value::String(s) => {
            let s = s.trim();
            Some((!s.is_empty()).then(|| s.to_string()))
        }
        Value::Number(n) => Some(Some(n.to_string())),
        Value::Bool(b) => Some(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn coerce_int(value: &Value) -> Option<Option<i32>> {
    match value {
        Value::Null => Some(None),
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()).map(Some),
        Value::String(s) if s.trim().is_empty() => Some(None),
        Value::String(s) => s.trim().parse().ok().map(Some),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<Option<bool>> {
    match value {
        Value::Null => Some(None),
        Value::Bool(b) => Some(Some(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(Some(false)),
            Some(1) => Some(Some(true)),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(Some(true)),
            "false" | "no" | "off" | "0" => Some(Some(false)),
            "" => Some(None),
            _ => None,
        },
        _ => None,
    }
}

fn set<T>(slot: &mut Option<T>, coerced: Option<Option<T>>) -> bool {
    match coerced {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

// Identifiers, audit columns and fee columns must never be listed here.
static WRITABLE: &[WritableField] = &[
    WritableField::new("position", |r, v| set(&mut r.position, coerce_text(v))),
    WritableField::new("jersey_size", |r, v| set(&mut r.jersey_size, coerce_text(v))),
    WritableField::new("shorts_size", |r, v| set(&mut r.shorts_size, coerce_text(v))),
    WritableField::new("uniform_number", |r, v| set(&mut r.uniform_number, coerce_text(v))),
    WritableField::new("grad_year", |r, v| set(&mut r.grad_year, coerce_int(v))),
    WritableField::new("school_name", |r, v| set(&mut r.school_name, coerce_text(v))),
    WritableField::new("school_grade", |r, v| set(&mut r.school_grade, coerce_text(v))),
    WritableField::new("height_inches", |r, v| set(&mut r.height_inches, coerce_int(v))),
    WritableField::new("club_name", |r, v| set(&mut r.club_name, coerce_text(v))),
    WritableField::new("medical_notes", |r, v| set(&mut r.medical_notes, coerce_text(v))),
    WritableField::new("special_requests", |r, v| set(&mut r.special_requests, coerce_text(v))),
    WritableField::new("waiver_accepted", |r, v| set(&mut r.waiver_accepted, coerce_bool(v))),
];

lazy_static! {
    static ref WRITABLE_BY_COLUMN: HashMap<String, &'static WritableField> = WRITABLE
        .iter()
        .map(|field| (normalize(field.property), field))
        .collect();
}

/// Looks up a writable registration property by column name
pub fn writable_field(column: &str) -> Option<&'static WritableField> {
    WRITABLE_BY_COLUMN.get(&normalize(column)).copied()
}

/// Maps client form field names onto registration properties through a job's metadata.
///
/// A name must be declared in the metadata, be client-writable there, and point at a column
/// in the writable registry. Anything else is dropped without error.
pub struct DynamicFieldMapper<'a> {
    metadata: &'a FieldMetadataSet,
}

impl<'a> DynamicFieldMapper<'a> {
    pub fn new(metadata: &'a FieldMetadataSet) -> Self {
        Self { metadata }
    }

    pub fn resolve(&self, client_name: &str) -> Option<&'static WritableField> {
        let field = self.metadata.field(client_name)?;
        if !field.is_client_writable() {
            return None;
        }
        writable_field(field.db_column.as_deref().unwrap_or(&field.name))
    }

    /// Writes every mappable value and returns how many were applied
    pub fn apply(&self, registration: &mut Registration, form_values: &HashMap<String, Value>) -> usize {
        let mut names: Vec<&String> = form_values.keys().collect();
        names.sort();

        let mut applied = 0;
        for name in names {
            let Some(field) = self.resolve(name) else {
                debug!(field = %name, "Dropping unmapped form field");
                continue;
            };
            if field.apply(registration, &form_values[name]) {
                applied += 1;
            } else {
                debug!(field = %name, property = field.property, "Dropping uncoercible form value");
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn metadata() -> FieldMetadataSet {
        FieldMetadataSet::parse(
            &json!({
                "fields": [
                    { "name": "JerseySize", "dbColumn": "jersey_size", "inputType": "select",
                      "options": ["S", "M", "L"] },
                    { "name": "gradYear", "dbColumn": "GradYear", "inputType": "number" },
                    { "name": "waiver", "dbColumn": "waiver_accepted", "inputType": "checkbox" },
                    { "name": "position" },
                    { "name": "feeBase", "dbColumn": "fee_base" },
                    { "name": "notes", "dbColumn": "medical_notes", "adminOnly": true },
                    { "name": "internal", "dbColumn": "club_name", "hidden": true },
                    { "name": "playerId", "dbColumn": "player_user_id" }
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    fn registration() -> Registration {
        Registration::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now().naive_utc(),
        )
    }

    #[test]
    fn test_registry_normalizes_column_names() {
        assert_eq!(writable_field("JerseySize").unwrap().property, "jersey_size");
        assert_eq!(writable_field("jersey-size").unwrap().property, "jersey_size");
        assert!(writable_field("fee_total").is_none());
        assert!(writable_field("registration_id").is_none());
        assert!(writable_field("modified_by").is_none());
    }

    #[test]
    fn test_maps_through_metadata() {
        let metadata = metadata();
        let mapper = DynamicFieldMapper::new(&metadata);
        let mut r = registration();

        let values = HashMap::from([
            ("jerseysize".to_string(), json!("M")),
            ("gradYear".to_string(), json!("2031")),
            ("waiver".to_string(), json!("yes")),
            ("position".to_string(), json!("Goalie")),
        ]);

        assert_eq!(mapper.apply(&mut r, &values), 4);
        assert_eq!(r.jersey_size.as_deref(), Some("M"));
        assert_eq!(r.grad_year, Some(2031));
        assert_eq!(r.waiver_accepted, Some(true));
        assert_eq!(r.position.as_deref(), Some("Goalie"));
    }

    #[test]
    fn test_financial_and_identity_fields_dropped() {
        let metadata = metadata();
        let mapper = DynamicFieldMapper::new(&metadata);
        let mut r = registration();
        let before = r.clone();

        let values = HashMap::from([
            ("feeBase".to_string(), json!(0)),
            ("playerId".to_string(), json!(Uuid::new_v4().to_string())),
            ("fee_total".to_string(), json!(1)),
            ("unknownField".to_string(), json!("x")),
        ]);

        assert_eq!(mapper.apply(&mut r, &values), 0);
        assert_eq!(r, before);
    }

    #[test]
    fn test_admin_only_and_hidden_dropped() {
        let metadata = metadata();
        let mapper = DynamicFieldMapper::new(&metadata);
        let mut r = registration();

        let values = HashMap::from([
            ("notes".to_string(), json!("asthma")),
            ("internal".to_string(), json!("Club A")),
        ]);

        assert_eq!(mapper.apply(&mut r, &values), 0);
        assert!(r.medical_notes.is_none());
        assert!(r.club_name.is_none());
    }

    #[test]
    fn test_uncoercible_values_dropped() {
        let metadata = metadata();
        let mapper = DynamicFieldMapper::new(&metadata);
        let mut r = registration();
        r.grad_year = Some(2030);

        let values = HashMap::from([
            ("gradYear".to_string(), json!("soon")),
            ("JerseySize".to_string(), json!(["M"])),
        ]);

        assert_eq!(mapper.apply(&mut r, &values), 0);
        assert_eq!(r.grad_year, Some(2030));
    }

    #[test]
    fn test_null_clears_value() {
        let metadata = metadata();
        let mapper = DynamicFieldMapper::new(&metadata);
        let mut r = registration();
        r.position = Some("Keeper".to_string());

        let values = HashMap::from([("position".to_string(), Value::Null)]);
        assert_eq!(mapper.apply(&mut r, &values), 1);
        assert!(r.position.is_none());
    }

    #[test]
    fn test_empty_metadata_document() {
        assert!(FieldMetadataSet::parse("  ").unwrap().fields.is_empty());
        assert!(FieldMetadataSet::parse("{not json").is_err());
    }
}
