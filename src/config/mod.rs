//! Runtime settings and the typed view of a Lima template.
//!
//! - [`Settings`] holds everything read from the environment or CLI flags
//! - [`LimaConfig`] is the part of a template the pipeline reads
//! - [`version`] compares the `minimum*Version` fields

pub mod schema;
pub mod settings;
pub mod version;

pub use schema::{
    Disk, Image, LimaConfig, LocatorWithDigest, Mount, Network, Probe, Provision, QemuOpts,
    VmOpts,
};
pub use settings::{Settings, DEFAULT_MAX_TEMPLATE_SIZE, DEFAULT_TIMEOUT_SECS};
pub use version::is_newer_version;
