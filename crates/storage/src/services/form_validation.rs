use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use super::field_mapper::{FieldMetadata, FieldMetadataSet};
use crate::dto::registration::{FieldValidationError, TeamSelection};

/// Every value a player submitted in one batch, merged across their selections
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerFormValues {
    pub player_id: Uuid,
    pub values: HashMap<String, Value>,
}

impl PlayerFormValues {
    /// Groups selections by player, keeping first-seen order. Later selections win on
    /// conflicting field names.
    pub fn from_selections(selections: &[TeamSelection]) -> Vec<Self> {
        let mut players: Vec<Self> = Vec::new();
        for selection in selections {
            let entry = match players.iter_mut().position(|p| p.player_id == selection.player_id) {
                Some(index) => &mut players[index],
                None => {
                    players.push(Self {
                        player_id: selection.player_id,
                        values: HashMap::new(),
                    });
                    let last = players.len() - 1;
                    &mut players[last]
                }
            };
            for (name, value) in &selection.form_values {
                entry.values.insert(name.clone(), value.clone());
            }
        }
        players
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

/// Server-side check of proposed form values against a job's form schema.
///
/// `Err` means the validator itself could not run (for example, unreadable metadata), which
/// is different from the values being invalid.
pub trait FormValidator: Send + Sync {
    fn validate_player_form_values(
        &self,
        metadata_json: Option<&str>,
        players: &[PlayerFormValues],
    ) -> Result<Vec<FieldValidationError>, String>;
}

/// Validates against the `fields` document stored on the job
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataFormValidator;

impl FormValidator for MetadataFormValidator {
    fn validate_player_form_values(
        &self,
        metadata_json: Option<&str>,
        players: &[PlayerFormValues],
    ) -> Result<Vec<FieldValidationError>, String> {
        let Some(json) = metadata_json else {
            return Ok(Vec::new());
        };
        let metadata = FieldMetadataSet::parse(json)
            .map_err(|e| format!("Invalid field metadata: {}", e))?;

        let mut errors = Vec::new();
        for player in players {
            for field in metadata.fields.iter().filter(|f| f.is_client_writable()) {
                if let Some(message) = check_field(field, player.get(&field.name)) {
                    errors.push(FieldValidationError {
                        player_id: player.player_id,
                        field: field.name.clone(),
                        message,
                    });
                }
            }
        }
        Ok(errors)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn check_field(field: &FieldMetadata, value: Option<&Value>) -> Option<String> {
    let name = field.display_name();

    let value = match value {
        Some(value) if !is_blank(value) => value,
        _ if field.required => return Some(format!("{} is required", name)),
        _ => return None,
    };

    let input_type = field.input_type.as_deref().unwrap_or("text").to_lowercase();
    match input_type.as_str() {
        "number" => {
            let Some(number) = as_number(value) else {
                return Some(format!("{} must be a number", name));
            };
            if let Some(min) = field.min
                && number < min
            {
                return Some(format!("{} must be at least {}", name, min));
            }
            if let Some(max) = field.max
                && number > max
            {
                return Some(format!("{} must be at most {}", name, max));
            }
        }
        "date" => {
            if NaiveDate::parse_from_str(&as_text(value), "%Y-%m-%d").is_err() {
                return Some(format!("{} must be a date (YYYY-MM-DD)", name));
            }
        }
        "checkbox" => {
            let valid = match value {
                Value::Bool(_) => true,
                Value::String(s) => matches!(
                    s.trim().to_lowercase().as_str(),
                    "true" | "false" | "yes" | "no" | "on" | "off"
                ),
                _ => false,
            };
            if !valid {
                return Some(format!("{} must be checked or unchecked", name));
            }
            if field.required && matches!(value, Value::Bool(false)) {
                return Some(format!("{} must be accepted", name));
            }
        }
        "email" => {
            let text = as_text(value);
            let valid = text
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                return Some(format!("{} must be a valid email address", name));
            }
        }
        _ => {}
    }

    if !field.options.is_empty() {
        let text = as_text(value);
        if !field.options.iter().any(|o| o.eq_ignore_ascii_case(&text)) {
            return Some(format!("{} must be one of: {}", name, field.options.join(", ")));
        }
    }

    if let Some(max_length) = field.max_length
        && as_text(value).chars().count() > max_length
    {
        return Some(format!("{} must be at most {} characters", name, max_length));
    }

    None
}
