//! punch-services: state shared between the UDP loop and the monitor.

pub mod policy;
pub mod registry;
pub mod stats;

pub use policy::{Admission, DenyList, OpenRegistration, RegistrationPolicy};
pub use registry::{PeerRegistry, RegistryEntry, Upserted};
pub use stats::{ProtocolStats, StatsSnapshot};
