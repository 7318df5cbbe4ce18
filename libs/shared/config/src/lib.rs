use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Where appointment, doctor and patient records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "in-memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Supabase => write!(f, "supabase"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub storage_backend: StorageBackend,
    pub appointment_slot_minutes: i64,
    pub directory_seed_path: Option<String>,
    pub bind_address: String,
}

pub const DEFAULT_SLOT_MINUTES: i64 = 60;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_default(),
            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|raw| {
                    raw.parse()
                        .map_err(|e| warn!("{}, falling back to in-memory storage", e))
                        .ok()
                })
                .unwrap_or(StorageBackend::Memory),
            appointment_slot_minutes: parse_slot_minutes(env::var("APPOINTMENT_SLOT_MINUTES").ok()),
            directory_seed_path: env::var("DIRECTORY_SEED_PATH").ok().filter(|p| !p.is_empty()),
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let auth_ready = !self.supabase_jwt_secret.is_empty();
        match self.storage_backend {
            StorageBackend::Memory => auth_ready,
            StorageBackend::Supabase => auth_ready && self.is_supabase_configured(),
        }
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    /// Bearer token used by the storage gateway; the service role key when
    /// present, otherwise the anon key.
    pub fn storage_access_token(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_slot_minutes(raw: Option<String>) -> i64 {
    match raw {
        None => DEFAULT_SLOT_MINUTES,
        Some(value) => match value.trim().parse::<i64>() {
            Ok(minutes) if minutes > 0 => minutes,
            _ => {
                warn!("APPOINTMENT_SLOT_MINUTES '{}' is not a positive integer, using {}", value, DEFAULT_SLOT_MINUTES);
                DEFAULT_SLOT_MINUTES
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_known_names() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!(" Supabase ".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn slot_minutes_fall_back_on_bad_input() {
        assert_eq!(parse_slot_minutes(None), DEFAULT_SLOT_MINUTES);
        assert_eq!(parse_slot_minutes(Some("30".to_string())), 30);
        assert_eq!(parse_slot_minutes(Some("0".to_string())), DEFAULT_SLOT_MINUTES);
        assert_eq!(parse_slot_minutes(Some("half an hour".to_string())), DEFAULT_SLOT_MINUTES);
    }

    #[test]
    fn storage_token_prefers_service_role_key() {
        let mut config = AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            supabase_service_role_key: String::new(),
            storage_backend: StorageBackend::Supabase,
            appointment_slot_minutes: DEFAULT_SLOT_MINUTES,
            directory_seed_path: None,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        };
        assert_eq!(config.storage_access_token(), "anon");
        config.supabase_service_role_key = "service".to_string();
        assert_eq!(config.storage_access_token(), "service");
        assert!(config.is_configured());
    }
}
