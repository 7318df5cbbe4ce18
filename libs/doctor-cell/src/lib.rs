pub mod models;
pub mod services;

pub use models::{AvailabilityWindow, Doctor, DoctorError};
pub use services::*;
