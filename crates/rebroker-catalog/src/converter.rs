//! Remote environment service → OSB service translation.

use serde_json::{json, Map, Value};

use crate::error::{CatalogError, CatalogResult};
use crate::model::{RemoteEnvironment, Service};
use crate::naming::external_name;
use crate::osb::{OsbPlan, OsbService};

/// Name of the single plan every catalog entry carries.
pub const DEFAULT_PLAN_NAME: &str = "default";

/// Converts remote environment services into OSB catalog entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Converter;

impl Converter {
    pub fn new() -> Self {
        Self
    }

    /// Convert every service of a remote environment; the first failure aborts.
    pub fn convert_all(&self, re: &RemoteEnvironment) -> CatalogResult<Vec<OsbService>> {
        re.services
            .iter()
            .map(|svc| self.convert(re, svc))
            .collect()
    }

    /// Convert one service of `re` into an OSB service with a `default` plan.
    pub fn convert(&self, re: &RemoteEnvironment, svc: &Service) -> CatalogResult<OsbService> {
        let metadata = service_metadata(re, svc)?;

        Ok(OsbService {
            id: svc.id.clone(),
            name: external_name(&svc.display_name, &svc.id),
            description: svc.display_name.clone(),
            tags: svc.tags.clone(),
            bindable: svc.is_bindable(),
            plan_updateable: false,
            metadata,
            plans: vec![default_plan(svc)],
        })
    }
}

fn default_plan(svc: &Service) -> OsbPlan {
    let mut metadata = Map::new();
    metadata.insert("displayName".to_string(), json!("Default"));
    OsbPlan {
        id: format!("{}-plan", svc.id),
        name: DEFAULT_PLAN_NAME.to_string(),
        description: "Default plan".to_string(),
        metadata,
    }
}

fn service_metadata(re: &RemoteEnvironment, svc: &Service) -> CatalogResult<Map<String, Value>> {
    let mut metadata = Map::new();
    metadata.insert("displayName".to_string(), json!(svc.display_name));
    metadata.insert(
        "providerDisplayName".to_string(),
        json!(svc.provider_display_name),
    );
    metadata.insert("longDescription".to_string(), json!(svc.long_description));
    metadata.insert("remoteEnvironmentServiceId".to_string(), json!(svc.id));
    metadata.insert(
        "source".to_string(),
        json!({
            "environment": re.source.environment,
            "type": re.source.kind,
            "namespace": re.source.namespace,
        }),
    );
    if let Some(labels) = binding_labels(svc)? {
        metadata.insert("bindingLabels".to_string(), Value::Object(labels));
    }
    metadata.insert("labels".to_string(), json!(svc.labels));
    Ok(metadata)
}

/// Labels a bound application gets; `None` for services without an API.
fn binding_labels(svc: &Service) -> CatalogResult<Option<Map<String, Value>>> {
    let Some(api) = &svc.api_entry else {
        return Ok(None);
    };
    if api.access_label.is_empty() {
        return Err(CatalogError::MissingAccessLabel {
            service_id: svc.id.clone(),
        });
    }
    let mut labels = Map::new();
    labels.insert(api.access_label.clone(), json!("true"));
    Ok(Some(labels))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::{ApiEntry, EventEntry, Source};

    fn api_service() -> Service {
        Service {
            id: "api-0023-abcd-2098".to_string(),
            display_name: "API Based Service display name".to_string(),
            long_description: "API Based Service long description".to_string(),
            provider_display_name: "HakunaMatata".to_string(),
            tags: vec!["tag1".to_string(), "tag2".to_string()],
            labels: HashMap::from([("connected-app".to_string(), "ec-prod".to_string())]),
            api_entry: Some(ApiEntry {
                gateway_url: "www.gate.com".to_string(),
                access_label: "access-label-1".to_string(),
                target_url: String::new(),
            }),
            event_entry: None,
        }
    }

    fn events_service() -> Service {
        Service {
            id: "events-123".to_string(),
            display_name: "Events".to_string(),
            long_description: String::new(),
            provider_display_name: "HakunaMatata".to_string(),
            tags: vec![],
            labels: HashMap::new(),
            api_entry: None,
            event_entry: Some(EventEntry::default()),
        }
    }

    fn remote_env(services: Vec<Service>) -> RemoteEnvironment {
        RemoteEnvironment {
            name: "ec-prod".to_string(),
            description: "EC production".to_string(),
            access_label: "ec-prod".to_string(),
            source: Source {
                environment: "prod".to_string(),
                kind: "commerce".to_string(),
                namespace: "com.example".to_string(),
            },
            services,
        }
    }

    #[test]
    fn converts_api_service() {
        let re = remote_env(vec![api_service()]);
        let out = Converter::new().convert(&re, &re.services[0]).unwrap();

        assert_eq!(out.id, "api-0023-abcd-2098");
        assert_eq!(out.name, external_name("API Based Service display name", "api-0023-abcd-2098"));
        assert_eq!(out.description, "API Based Service display name");
        assert!(out.bindable);
        assert!(!out.plan_updateable);
        assert_eq!(out.tags, vec!["tag1", "tag2"]);

        assert_eq!(out.plans.len(), 1);
        assert_eq!(out.plans[0].name, "default");
        assert_eq!(out.plans[0].id, "api-0023-abcd-2098-plan");

        assert_eq!(out.metadata["providerDisplayName"], json!("HakunaMatata"));
        assert_eq!(out.metadata["longDescription"], json!("API Based Service long description"));
        assert_eq!(
            out.metadata["source"],
            json!({"environment": "prod", "type": "commerce", "namespace": "com.example"})
        );
        assert_eq!(out.metadata["bindingLabels"], json!({"access-label-1": "true"}));
        assert_eq!(out.metadata["labels"], json!({"connected-app": "ec-prod"}));
    }

    #[test]
    fn display_name_is_kept_verbatim_in_metadata() {
        let mut svc = api_service();
        svc.display_name = "*Service Name\ną-'#$\tÜ".to_string();
        let re = remote_env(vec![svc]);

        let out = Converter::new().convert(&re, &re.services[0]).unwrap();

        assert_eq!(out.metadata["displayName"], json!("*Service Name\ną-'#$\tÜ"));
        assert!(out.name.starts_with("service-name-"));
    }

    #[test]
    fn missing_access_label_fails() {
        let mut svc = api_service();
        if let Some(api) = svc.api_entry.as_mut() {
            api.access_label.clear();
        }
        let re = remote_env(vec![svc]);

        let err = Converter::new().convert(&re, &re.services[0]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot create binding labels: accessLabel field is required to build bindingLabels"
        );
    }

    #[test]
    fn events_service_is_not_bindable() {
        let re = remote_env(vec![events_service()]);
        let out = Converter::new().convert(&re, &re.services[0]).unwrap();

        assert!(!out.bindable);
        assert!(!out.metadata.contains_key("bindingLabels"));
    }

    #[test]
    fn convert_all_fails_fast() {
        let mut broken = api_service();
        broken.id = "broken".to_string();
        if let Some(api) = broken.api_entry.as_mut() {
            api.access_label.clear();
        }
        let re = remote_env(vec![events_service(), broken]);

        assert!(Converter::new().convert_all(&re).is_err());
    }
}
