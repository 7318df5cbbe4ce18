// libs/appointment-cell/src/state.rs
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use doctor_cell::{Doctor, DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
use patient_cell::{InMemoryPatientDirectory, Patient, PatientDirectory, SupabasePatientDirectory};
use shared_config::{AppConfig, StorageBackend};
use shared_database::supabase::SupabaseClient;

use crate::models::SchedulingRules;
use crate::services::{
    AppointmentLifecycleManager, AppointmentRepository, InMemoryAppointmentRepository,
    JwtIdentityResolver, SupabaseAppointmentRepository,
};

/// Doctors and patients loaded into the in-memory directories at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub patients: Vec<Patient>,
}

impl DirectorySeed {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading directory seed {}", path.display()))?;
        let seed: DirectorySeed = serde_json::from_str(&raw)
            .with_context(|| format!("parsing directory seed {}", path.display()))?;

        info!(
            "Loaded {} doctors and {} patients from {}",
            seed.doctors.len(),
            seed.patients.len(),
            path.display()
        );
        Ok(seed)
    }
}

/// Shared state behind the appointment routes.
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub lifecycle: AppointmentLifecycleManager,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, lifecycle: AppointmentLifecycleManager) -> Self {
        Self { config, lifecycle }
    }

    /// Wires the collaborators for the configured storage backend.
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        let rules = SchedulingRules::from_config(&config);
        let identities = Arc::new(JwtIdentityResolver::new(config.supabase_jwt_secret.clone()));

        let (appointments, doctors, patients): (
            Arc<dyn AppointmentRepository>,
            Arc<dyn DoctorDirectory>,
            Arc<dyn PatientDirectory>,
        ) = match config.storage_backend {
            StorageBackend::Memory => {
                let seed = match &config.directory_seed_path {
                    Some(path) => DirectorySeed::load(path)?,
                    None => DirectorySeed::default(),
                };
                (
                    Arc::new(InMemoryAppointmentRepository::new()),
                    Arc::new(InMemoryDoctorDirectory::with_doctors(seed.doctors)),
                    Arc::new(InMemoryPatientDirectory::with_patients(seed.patients)),
                )
            }
            StorageBackend::Supabase => {
                if !config.is_supabase_configured() {
                    anyhow::bail!("STORAGE_BACKEND=supabase requires SUPABASE_URL and SUPABASE_ANON_PUBLIC_KEY");
                }
                let supabase = Arc::new(SupabaseClient::new(&config));
                let token = config.storage_access_token().to_string();
                (
                    Arc::new(SupabaseAppointmentRepository::new(Arc::clone(&supabase), token.clone())),
                    Arc::new(SupabaseDoctorDirectory::new(Arc::clone(&supabase), token.clone())),
                    Arc::new(SupabasePatientDirectory::new(supabase, token)),
                )
            }
        };

        info!(
            "Appointment storage: {} ({}-minute slots)",
            config.storage_backend, rules.slot_duration_minutes
        );

        let lifecycle =
            AppointmentLifecycleManager::new(appointments, doctors, patients, identities, rules);
        Ok(Self::new(config, lifecycle))
    }
}
