use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    /// Display name shown on the doctor's day view.
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Patient {
    /// Case-insensitive comparison against a search term.
    pub fn name_matches(&self, filter: &str) -> bool {
        self.name.trim().to_lowercase() == filter.trim().to_lowercase()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
