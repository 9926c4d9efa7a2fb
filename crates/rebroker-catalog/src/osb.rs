//! OSB catalog wire types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `GET /v2/catalog`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CatalogResponse {
    pub services: Vec<OsbService>,
}

/// One catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsbService {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub bindable: bool,
    pub plan_updateable: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub plans: Vec<OsbPlan>,
}

/// A plan of a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsbPlan {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
