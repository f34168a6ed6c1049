use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Keys inspected in the job's JSON options when no explicit mode token is set
const MODE_OPTION_KEYS: &[&str] = &[
    "registrationMode",
    "profileMode",
    "regProfileType",
    "registrationType",
];

/// Whether a player may hold registrations on more than one team of the same job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationMode {
    /// "PP": one team per player
    SingleTeam,
    /// "CAC": several teams per player
    MultiTeam,
}

impl RegistrationMode {
    /// Parses a profile token such as `PP10` or `CAC05`.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_uppercase();
        if token.starts_with("CAC") {
            Some(Self::MultiTeam)
        } else if token.starts_with("PP") {
            Some(Self::SingleTeam)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleTeam => "PP",
            Self::MultiTeam => "CAC",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobConfiguration {
    pub job_id: Uuid,
    pub name: String,
    pub registration_mode_token: Option<String>,
    pub json_options: Option<Json<Value>>,
    pub player_profile_metadata_json: Option<String>,
}

impl JobConfiguration {
    /// Explicit token first, then the JSON options, then single-team.
    pub fn registration_mode(&self) -> RegistrationMode {
        if let Some(mode) = self
            .registration_mode_token
            .as_deref()
            .and_then(RegistrationMode::from_token)
        {
            return mode;
        }

        if let Some(Json(Value::Object(options))) = &self.json_options {
            for key in MODE_OPTION_KEYS {
                if let Some(mode) = options
                    .get(*key)
                    .and_then(Value::as_str)
                    .and_then(RegistrationMode::from_token)
                {
                    return mode;
                }
            }
        }

        RegistrationMode::SingleTeam
    }
}
