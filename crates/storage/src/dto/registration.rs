use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One player→team choice submitted from the registration wizard
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamSelection {
    pub player_id: Uuid,
    pub team_id: Uuid,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub form_values: HashMap<String, Value>,
}

impl TeamSelection {
    pub fn new(player_id: Uuid, team_id: Uuid) -> Self {
        Self {
            player_id,
            team_id,
            form_values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, field: &str, value: Value) -> Self {
        self.form_values.insert(field.to_string(), value);
        self
    }
}

/// Request payload for reconciling a family's team selections
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReconcileRequest {
    pub family_user_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 selections are required"))]
    pub selections: Vec<TeamSelection>,
}

/// Outcome of a single player/team selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TeamResult {
    pub player_id: Uuid,
    pub team_id: Uuid,
    pub is_full: bool,
    pub team_name: Option<String>,
    pub message: String,
    pub registration_created: bool,
    pub registration_id: Option<Uuid>,
}

/// Wizard tab the client should show next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum NextTab {
    Team,
    Forms,
    Payment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldValidationError {
    pub player_id: Uuid,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReconcileResponse {
    pub results: Vec<TeamResult>,
    pub next_tab: NextTab,
    pub committed: bool,
    pub validation_errors: Vec<FieldValidationError>,
    #[schema(value_type = Option<Object>)]
    pub insurance_offer: Option<Value>,
}

impl ReconcileResponse {
    pub fn any_team_full(&self) -> bool {
        self.results.iter().any(|r| r.is_full)
    }
}
