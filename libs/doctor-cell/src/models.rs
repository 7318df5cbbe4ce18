use serde::{Deserialize, Serialize};
use chrono::{NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialty: String,
    pub email: Option<String>,
    /// Daily working windows written as `"HH:MM-HH:MM"`.
    #[serde(default)]
    pub available_times: Vec<String>,
}

impl Doctor {
    pub fn availability_windows(&self) -> impl Iterator<Item = Result<AvailabilityWindow, DoctorError>> + '_ {
        self.available_times.iter().map(|raw| raw.parse::<AvailabilityWindow>())
    }

    /// True when `[start, end)` fits inside one of the doctor's windows on a
    /// single day. Malformed windows are ignored.
    pub fn is_available_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        if end <= start || start.date() != end.date() {
            return false;
        }

        self.availability_windows().any(|window| match window {
            Ok(window) => window.contains(start.time(), end.time()),
            Err(e) => {
                warn!("Skipping availability entry of doctor {}: {}", self.id, e);
                false
            }
        })
    }
}

/// A daily span of working time, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl AvailabilityWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, DoctorError> {
        if start >= end {
            return Err(DoctorError::InvalidAvailability(format!(
                "window start {} is not before end {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, slot_start: NaiveTime, slot_end: NaiveTime) -> bool {
        self.start <= slot_start && slot_end <= self.end
    }
}

impl FromStr for AvailabilityWindow {
    type Err = DoctorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (start, end) = raw
            .split_once('-')
            .ok_or_else(|| DoctorError::InvalidAvailability(format!("'{}' is not a HH:MM-HH:MM range", raw)))?;

        AvailabilityWindow::new(parse_clock(start)?, parse_clock(end)?)
    }
}

impl fmt::Display for AvailabilityWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

fn parse_clock(raw: &str) -> Result<NaiveTime, DoctorError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| DoctorError::InvalidAvailability(format!("'{}' is not a clock time", raw)))
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DoctorError {
    #[error("Invalid availability: {0}")]
    InvalidAvailability(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
