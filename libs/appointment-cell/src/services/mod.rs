pub mod availability;
pub mod identity;
pub mod lifecycle;
pub mod locks;
pub mod repository;
pub mod supabase;

pub use availability::{check_slot, AvailabilityValidator};
pub use identity::{IdentityResolver, JwtIdentityResolver};
pub use lifecycle::AppointmentLifecycleManager;
pub use locks::KeyedLocks;
pub use repository::{AppointmentRepository, InMemoryAppointmentRepository};
pub use supabase::SupabaseAppointmentRepository;
