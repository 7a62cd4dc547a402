use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::{DeployError, DeployResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
}

/// A path parameter of a URL template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PathParam {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ParamType::String,
            required: true,
            description: None,
        }
    }

    #[must_use]
    pub const fn ty(mut self, ty: ParamType) -> Self {
        self.ty = ty;
        self
    }

    #[must_use]
    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }
}

/// One callable HTTP operation exposed at the gateway.
///
/// # Example
///
/// ```
/// use ponte::gateway::{Method, Operation, PathParam};
///
/// let op = Operation::new("dronestatusGET", Method::Get, "/dronestatus/{deviceid}")
///     .display_name("Retrieve drone status")
///     .param(PathParam::new("deviceid").description("device id"))
///     .rewrite("GetStatusFunction?deviceId={deviceid}");
///
/// assert!(op.validate().is_ok());
/// assert_eq!(op.prefix(), Some("dronestatus"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub operation_id: String,
    pub method: Method,
    pub url_template: String,
    pub display_name: String,
    pub description: Option<String>,
    pub params: Vec<PathParam>,
    pub rewrite: Option<String>,
}

impl Operation {
    #[must_use]
    pub fn new(operation_id: &str, method: Method, url_template: &str) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            method,
            url_template: url_template.to_string(),
            display_name: operation_id.to_string(),
            description: None,
            params: Vec::new(),
            rewrite: None,
        }
    }

    #[must_use]
    pub fn display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    #[must_use]
    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn param(mut self, param: PathParam) -> Self {
        self.params.push(param);
        self
    }

    /// Backend URI the public template is rewritten to. Defaults to
    /// the public template itself.
    #[must_use]
    pub fn rewrite(mut self, template: &str) -> Self {
        self.rewrite = Some(template.to_string());
        self
    }

    #[must_use]
    pub fn rewrite_template(&self) -> &str {
        self.rewrite.as_deref().unwrap_or(&self.url_template)
    }

    /// First literal path segment of the URL template.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.url_template
            .split('/')
            .find(|s| !s.is_empty())
            .filter(|s| !s.contains('{'))
    }

    /// Check that the URL template and the rewrite template reference
    /// exactly the declared parameters.
    pub fn validate(&self) -> DeployResult<()> {
        let id = self.operation_id.as_str();
        if id.is_empty() {
            return Err(DeployError::malformed("", "operation id must not be empty"));
        }
        if !self.url_template.starts_with('/') {
            return Err(DeployError::malformed(
                id,
                format!("URL template '{}' must start with '/'", self.url_template),
            ));
        }

        let mut declared = BTreeSet::new();
        for p in &self.params {
            if !declared.insert(p.name.as_str()) {
                return Err(DeployError::malformed(
                    id,
                    format!("parameter '{}' declared twice", p.name),
                ));
            }
        }

        let used = template_params(id, &self.url_template)?;
        let used: BTreeSet<&str> = used.iter().map(String::as_str).collect();

        if let Some(undeclared) = used.difference(&declared).next() {
            return Err(DeployError::malformed(
                id,
                format!("template token {{{undeclared}}} has no declared parameter"),
            ));
        }
        if let Some(unused) = declared.difference(&used).next() {
            return Err(DeployError::malformed(
                id,
                format!("parameter '{unused}' does not appear in the URL template"),
            ));
        }

        let rewritten = template_params(id, self.rewrite_template())?;
        let rewritten: BTreeSet<&str> = rewritten.iter().map(String::as_str).collect();
        if rewritten != used {
            return Err(DeployError::malformed(
                id,
                format!(
                    "rewrite template '{}' must map exactly the route parameters",
                    self.rewrite_template()
                ),
            ));
        }

        Ok(())
    }
}

/// Names of the `{param}` tokens of a template, in order of
/// appearance.
pub fn template_params(operation: &str, template: &str) -> DeployResult<Vec<String>> {
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err(DeployError::malformed(
                operation,
                format!("unbalanced '}}' in template '{template}'"),
            ));
        }
        let after = &rest[open + 1..];
        let close = after.find(['{', '}']).filter(|&i| after[i..].starts_with('}'));
        let Some(close) = close else {
            return Err(DeployError::malformed(
                operation,
                format!("unclosed '{{' in template '{template}'"),
            ));
        };
        let name = &after[..close];
        if name.is_empty() {
            return Err(DeployError::malformed(
                operation,
                format!("empty parameter in template '{template}'"),
            ));
        }
        if names.iter().any(|n| n == name) {
            return Err(DeployError::malformed(
                operation,
                format!("parameter {{{name}}} repeated in template '{template}'"),
            ));
        }
        names.push(name.to_string());
        rest = &after[close + 1..];
    }

    Ok(names)
}
