use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Naming conventions shared by every resource of a deployment.
///
/// All derived names are computed from these fields; nothing in the
/// crate hard-codes a suffix.
///
/// # Example
///
/// ```
/// use ponte::Naming;
///
/// let naming = Naming::new("drone");
///
/// assert_eq!(naming.gateway_service(), "drone-apim");
/// assert_eq!(naming.gateway_host(), "drone-apim.azure-api.net");
/// assert_eq!(naming.frontend_account(), "dronefe");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Naming {
    pub app_name: String,
    pub gateway_suffix: String,
    pub gateway_domain: String,
    pub frontend_suffix: String,
    pub cdn_profile_suffix: String,
    pub cdn_endpoint_suffix: String,
    pub identity_suffix: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            app_name: "app".to_string(),
            gateway_suffix: "-apim".to_string(),
            gateway_domain: "azure-api.net".to_string(),
            frontend_suffix: "fe".to_string(),
            cdn_profile_suffix: "-cdn".to_string(),
            cdn_endpoint_suffix: "-endpoint".to_string(),
            identity_suffix: "-api".to_string(),
        }
    }
}

impl Naming {
    #[must_use]
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            ..Self::default()
        }
    }

    /// Parse naming conventions from YAML. Missing keys keep their
    /// defaults.
    pub fn from_yaml(content: &str) -> DeployResult<Self> {
        let naming: Self = serde_yaml::from_str(content)?;
        naming.validate()?;
        Ok(naming)
    }

    pub fn load(path: &Path) -> DeployResult<Self> {
        if !path.exists() {
            return Err(DeployError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> DeployResult<()> {
        if self.app_name.is_empty() {
            return Err(DeployError::InvalidConfig("app_name must not be empty".into()));
        }
        if self.gateway_domain.is_empty() {
            return Err(DeployError::InvalidConfig(
                "gateway_domain must not be empty".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn gateway_service(&self) -> String {
        format!("{}{}", self.app_name, self.gateway_suffix)
    }

    #[must_use]
    pub fn gateway_host(&self) -> String {
        format!("{}.{}", self.gateway_service(), self.gateway_domain)
    }

    #[must_use]
    pub fn frontend_account(&self) -> String {
        format!("{}{}", self.app_name, self.frontend_suffix)
    }

    #[must_use]
    pub fn cdn_profile(&self) -> String {
        format!("{}{}", self.app_name, self.cdn_profile_suffix)
    }

    #[must_use]
    pub fn cdn_endpoint(&self) -> String {
        format!("{}{}", self.app_name, self.cdn_endpoint_suffix)
    }

    #[must_use]
    pub fn identity_app(&self) -> String {
        format!("{}{}", self.app_name, self.identity_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let naming = Naming::default();

        assert_eq!(naming.app_name, "app");
        assert_eq!(naming.gateway_service(), "app-apim");
        assert_eq!(naming.cdn_profile(), "app-cdn");
        assert_eq!(naming.cdn_endpoint(), "app-endpoint");
        assert_eq!(naming.identity_app(), "app-api");
    }

    #[test]
    fn yaml_overrides_selected_keys() {
        let naming = Naming::from_yaml("app_name: drone\ngateway_suffix: -gw\n").unwrap();

        assert_eq!(naming.gateway_service(), "drone-gw");
        assert_eq!(naming.gateway_domain, "azure-api.net");
    }

    #[test]
    fn empty_app_name_rejected() {
        let err = Naming::from_yaml("app_name: ''\n").unwrap_err();

        assert!(matches!(err, DeployError::InvalidConfig(_)));
    }
}
