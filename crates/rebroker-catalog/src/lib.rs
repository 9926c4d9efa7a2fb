//! rebroker-catalog: remote environments and the OSB catalog built from them.
//!
//! # Components
//!
//! - **`model`**: remote environments and the services they expose
//! - **`registry`**: in-memory registry implementing [`RemoteEnvironmentFinder`]
//! - **`naming`**: deterministic external names for catalog entries
//! - **`converter`**: remote environment service → OSB service translation
//! - **`catalog`**: fail-fast catalog assembly over every registered environment

pub mod catalog;
pub mod converter;
pub mod error;
pub mod model;
pub mod naming;
pub mod osb;
pub mod registry;

pub use catalog::CatalogService;
pub use converter::Converter;
pub use error::{CatalogError, CatalogResult};
pub use model::{ApiEntry, EventEntry, RemoteEnvironment, Service, Source};
pub use naming::external_name;
pub use osb::{CatalogResponse, OsbPlan, OsbService};
pub use registry::{RemoteEnvironmentFinder, RemoteEnvironmentRegistry};
