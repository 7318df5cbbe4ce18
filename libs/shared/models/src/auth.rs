use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Doctor => write!(f, "doctor"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

/// Role and numeric id of whoever presented a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub role: Role,
    pub id: i64,
}

impl Identity {
    pub fn doctor(id: i64) -> Self {
        Self { role: Role::Doctor, id }
    }

    pub fn patient(id: i64) -> Self {
        Self { role: Role::Patient, id }
    }

    pub fn is_doctor(&self, doctor_id: i64) -> bool {
        self.role == Role::Doctor && self.id == doctor_id
    }

    pub fn is_patient(&self, patient_id: i64) -> bool {
        self.role == Role::Patient && self.id == patient_id
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

impl TryFrom<&User> for Identity {
    type Error = String;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = user
            .id
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("Subject '{}' is not a numeric account id", user.id))?;

        let role = match user.role.as_deref() {
            Some("doctor") => Role::Doctor,
            Some("patient") => Role::Patient,
            Some(other) => return Err(format!("Role '{}' cannot act on appointments", other)),
            None => return Err("Token carries no role".to_string()),
        };

        Ok(Identity { role, id })
    }
}
