//! rebroker-access: may this service be provisioned into this namespace?
//!
//! The decision is asynchronous and may wait: a remote environment is enabled
//! in a namespace by an EnvironmentMapping that can show up shortly after the
//! provision request, so the checker polls for it up to a caller-supplied
//! bound before giving up.

pub mod checker;
pub mod error;
pub mod mapping;

pub use checker::{CanProvisionOutput, NamespaceAccessChecker, ProvisionChecker};
pub use error::{AccessError, AccessResult};
pub use mapping::{EnvironmentMappingLister, MappingRegistry};
