//! Canonical resource naming for model deployment groups
//!
//! Every resource name the control plane builds or parses goes through
//! this module so that creation, listing and teardown agree on names.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Suffix of the workload name; also the cut point for name recovery
pub const DEPLOYMENT_SUFFIX: &str = "-deployment";
pub const SERVICE_PREFIX: &str = "python-service-";
pub const AUTOSCALER_SUFFIX: &str = "-hpa";
pub const CONTAINER_SUFFIX: &str = "-container";

/// Label shared by every member of a group
pub const APP_LABEL: &str = "app";

/// Extensions of serialized model files, dropped during derivation
pub const MODEL_EXTENSIONS: &[&str] = &[
    "h5", "hdf5", "keras", "pkl", "pickle", "joblib", "onnx", "pt", "pth", "pb", "sav",
];

/// Derive the canonical group name from a raw model identifier.
///
/// Directory components and a trailing model-file extension are dropped,
/// then the result is lower-cased with `_` replaced by `-`. Other dotted
/// suffixes such as `model.v2` are part of the name, so deriving from a
/// canonical name gives it back unchanged.
pub fn derive_canonical_name(raw: &str) -> String {
    let raw = raw.trim();
    let file_name = Path::new(raw)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(raw);
    let stem = match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if MODEL_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext)) => {
            &file_name[..file_name.len() - ext.len() - 1]
        }
        _ => file_name,
    };
    stem.to_lowercase().replace('_', "-")
}

/// Recover the canonical name from a deployment name.
///
/// Cuts at the first occurrence of `-deployment`, wherever it appears.
/// Names without the suffix are returned unchanged.
pub fn canonical_from_deployment(deployment: &str) -> &str {
    match deployment.find(DEPLOYMENT_SUFFIX) {
        Some(idx) => &deployment[..idx],
        None => deployment,
    }
}

/// Service name expected for a deployment
pub fn service_for_deployment(deployment: &str) -> String {
    format!("{}{}", SERVICE_PREFIX, canonical_from_deployment(deployment))
}

/// Names of every resource in one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNames {
    pub canonical: String,
    pub deployment: String,
    pub service: String,
    pub autoscaler: String,
    pub container: String,
}

impl GroupNames {
    /// Names for a model identifier such as an uploaded file name
    pub fn for_model(raw: &str) -> Result<Self> {
        Self::from_canonical(derive_canonical_name(raw))
    }

    /// Names for an API reference: a model name, canonical name or
    /// deployment name all resolve to the same group.
    pub fn resolve(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.contains(DEPLOYMENT_SUFFIX) {
            Self::from_canonical(canonical_from_deployment(reference).to_string())
        } else {
            Self::for_model(reference)
        }
    }

    fn from_canonical(canonical: String) -> Result<Self> {
        if canonical.is_empty() {
            return Err(Error::validation("model name must not be empty"));
        }
        Ok(Self {
            deployment: format!("{}{}", canonical, DEPLOYMENT_SUFFIX),
            service: format!("{}{}", SERVICE_PREFIX, canonical),
            autoscaler: format!("{}{}", canonical, AUTOSCALER_SUFFIX),
            container: format!("{}{}", canonical, CONTAINER_SUFFIX),
            canonical,
        })
    }

    /// `app=<canonical>` selector shared by workload, pods and service
    pub fn selector(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(APP_LABEL.to_string(), self.canonical.clone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_normalizes_case_underscores_and_extension() {
        assert_eq!(derive_canonical_name("My_Model.h5"), "my-model");
        assert_eq!(derive_canonical_name("fraud-model"), "fraud-model");
        assert_eq!(derive_canonical_name("uploads/Churn_V2.h5"), "churn-v2");
    }

    #[test]
    fn test_derive_keeps_non_model_suffixes() {
        assert_eq!(derive_canonical_name("Model.V2.h5"), "model.v2");
        assert_eq!(derive_canonical_name("model.v2"), "model.v2");
        assert_eq!(derive_canonical_name("CHURN.ONNX"), "churn");
        assert_eq!(derive_canonical_name("scaler.joblib"), "scaler");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive_canonical_name("Some_Model.keras");
        let b = derive_canonical_name("Some_Model.keras");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_sanitized_inputs_stay_distinct() {
        assert_ne!(
            derive_canonical_name("model_a.h5"),
            derive_canonical_name("model_b.h5")
        );
    }

    #[test]
    fn test_recovery_cuts_at_first_suffix() {
        assert_eq!(canonical_from_deployment("fraud-model-deployment"), "fraud-model");
        assert_eq!(canonical_from_deployment("a-deployment-b-deployment"), "a");
        assert_eq!(canonical_from_deployment("my-deployment-model-deployment"), "my");
        assert_eq!(canonical_from_deployment("no-suffix"), "no-suffix");
    }

    #[test]
    fn test_service_name_for_deployment() {
        assert_eq!(
            service_for_deployment("fraud-model-deployment"),
            "python-service-fraud-model"
        );
    }

    #[test]
    fn test_group_names_follow_convention() {
        let names = GroupNames::for_model("Fraud_Model.h5").unwrap();
        assert_eq!(names.canonical, "fraud-model");
        assert_eq!(names.deployment, "fraud-model-deployment");
        assert_eq!(names.service, "python-service-fraud-model");
        assert_eq!(names.autoscaler, "fraud-model-hpa");
        assert_eq!(names.container, "fraud-model-container");
        assert_eq!(names.selector().get(APP_LABEL).unwrap(), "fraud-model");
    }

    #[test]
    fn test_resolve_accepts_model_and_deployment_references() {
        let from_model = GroupNames::resolve("fraud-model").unwrap();
        let from_deployment = GroupNames::resolve("fraud-model-deployment").unwrap();
        let from_file = GroupNames::resolve("Fraud_Model.h5").unwrap();
        assert_eq!(from_model, from_deployment);
        assert_eq!(from_model, from_file);
    }

    #[test]
    fn test_resolve_gives_back_dotted_canonical_names() {
        let created = GroupNames::for_model("Model.V2.h5").unwrap();
        assert_eq!(created.canonical, "model.v2");

        let resolved = GroupNames::resolve("model.v2").unwrap();
        assert_eq!(resolved, created);
        assert_eq!(resolved.deployment, "model.v2-deployment");
        assert_eq!(GroupNames::resolve("model.v2-deployment").unwrap(), created);

        for raw in ["Fraud_Model.h5", "uploads/churn.pkl", "a.b.c", "plain"] {
            let names = GroupNames::for_model(raw).unwrap();
            assert_eq!(GroupNames::resolve(&names.canonical).unwrap(), names, "{raw}");
        }
    }

    #[test]
    fn test_empty_names_are_rejected() {
        assert!(matches!(GroupNames::for_model(""), Err(Error::Validation(_))));
        assert!(matches!(GroupNames::resolve("  "), Err(Error::Validation(_))));
        assert!(matches!(
            GroupNames::resolve("-deployment"),
            Err(Error::Validation(_))
        ));
    }
}
