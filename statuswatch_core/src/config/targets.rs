//! Target model: the groups and endpoints to probe and what "healthy" means
//! for each of them. Loaded from YAML, validated once, then treated as
//! immutable until the next reload replaces it wholesale.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

use crate::error::{AppError, Result};

pub const MIN_REFRESH_INTERVAL_SECONDS: f64 = 10.0;

/// Rules a response must satisfy to count as healthy.
///
/// With neither field set any 2xx code is healthy. A code requires an exact
/// match, a body requires a byte-exact match; when both are set both apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "text_body")]
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub target_status: TargetStatus,
}

impl Endpoint {
    pub fn http_method(&self) -> Method {
        if self.method == "HEAD" {
            Method::HEAD
        } else {
            Method::GET
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub url: String,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// Raw `authorization` block. Turned into an [`crate::auth::Authorizer`]
/// when the configuration is loaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationSettings {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub cert: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing)]
    pub authorization: AuthorizationSettings,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: f64,
    #[serde(default, alias = "default_http_method", skip_serializing)]
    pub default_http_method: String,
    #[serde(default)]
    pub groups: Vec<Group>,
}

fn default_refresh_interval() -> f64 {
    MIN_REFRESH_INTERVAL_SECONDS
}

impl Configuration {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let mut configuration: Configuration = serde_yaml::from_str(data)?;
        configuration.normalize()?;
        Ok(configuration)
    }

    fn normalize(&mut self) -> Result<()> {
        if self.refresh_interval > 0.0
            && Duration::try_from_secs_f64(self.refresh_interval).is_err()
        {
            return Err(AppError::Configuration(format!(
                "refreshInterval out of range: {}",
                self.refresh_interval
            )));
        }
        if self.refresh_interval.is_nan() || self.refresh_interval < MIN_REFRESH_INTERVAL_SECONDS {
            info!(
                "Configuration: refreshInterval too low: {}. Set to {}",
                self.refresh_interval, MIN_REFRESH_INTERVAL_SECONDS
            );
            self.refresh_interval = MIN_REFRESH_INTERVAL_SECONDS;
        }

        self.default_http_method = match normalize_method(&self.default_http_method) {
            Some(method) => method,
            None => {
                if !self.default_http_method.is_empty() {
                    error!(
                        "Default HTTP method {} not supported. Defaulting to GET",
                        self.default_http_method
                    );
                }
                "GET".to_string()
            }
        };

        let mut group_names = HashSet::new();
        for group in &mut self.groups {
            if !group_names.insert(group.name.clone()) {
                return Err(AppError::Configuration(format!(
                    "Duplicate group name: {}",
                    group.name
                )));
            }

            let mut endpoint_names = HashSet::new();
            for endpoint in &mut group.endpoints {
                if !endpoint_names.insert(endpoint.name.clone()) {
                    return Err(AppError::Configuration(format!(
                        "Duplicate endpoint name {} in group {}",
                        endpoint.name, group.name
                    )));
                }

                endpoint.method = match normalize_method(&endpoint.method) {
                    Some(method) => method,
                    None => {
                        if !endpoint.method.is_empty() {
                            error!(
                                "HTTP method {} for endpoint {} not supported. Defaulting to {}",
                                endpoint.method, endpoint.url, self.default_http_method
                            );
                        }
                        self.default_http_method.clone()
                    }
                };

                let target = &mut endpoint.target_status;
                target.code = target.code.filter(|code| *code != 0);
                if target.body.as_ref().is_some_and(|body| body.is_empty()) {
                    target.body = None;
                }
            }
        }

        self.authorization.kind = self.authorization.kind.trim().to_lowercase();
        if self.authorization.kind == "client-cert" && self.authorization.cert.is_none() {
            return Err(AppError::Configuration(format!(
                "authorization.cert must be set when authorization.type is \"{}\"",
                self.authorization.kind
            )));
        }
        if matches!(self.authorization.kind.as_str(), "client-cert" | "client-cert-info")
            && self.authorization.header.trim().is_empty()
        {
            return Err(AppError::Configuration(format!(
                "authorization.header must be set when authorization.type is \"{}\"",
                self.authorization.kind
            )));
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.refresh_interval)
            .unwrap_or(Duration::from_secs(MIN_REFRESH_INTERVAL_SECONDS as u64))
            .max(Duration::from_secs(MIN_REFRESH_INTERVAL_SECONDS as u64))
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn find(&self, group_name: &str, endpoint_name: &str) -> Option<(&Group, &Endpoint)> {
        let group = self.group(group_name)?;
        let endpoint = group
            .endpoints
            .iter()
            .find(|endpoint| endpoint.name == endpoint_name)?;
        Some((group, endpoint))
    }

    pub fn endpoints(&self) -> impl Iterator<Item = (&Group, &Endpoint)> {
        self.groups
            .iter()
            .flat_map(|group| group.endpoints.iter().map(move |endpoint| (group, endpoint)))
    }
}

/// Resolves an endpoint URL against its group's base URL.
///
/// The result store is keyed by this URL, so the scheduler and every reader
/// must go through this one function.
pub fn resolve_endpoint_url(group: &Group, endpoint: &Endpoint) -> Result<Url> {
    let base = Url::parse(&group.url).map_err(|e| {
        AppError::Configuration(format!(
            "Invalid base URL for group {}: {}. Error: {}",
            group.name, group.url, e
        ))
    })?;

    base.join(&endpoint.url).map_err(|e| {
        AppError::Configuration(format!(
            "Invalid URL for endpoint {} in group {}: {}. Error: {}",
            endpoint.name, group.name, endpoint.url, e
        ))
    })
}

fn normalize_method(method: &str) -> Option<String> {
    match method.trim().to_uppercase().as_str() {
        "GET" => Some("GET".to_string()),
        "HEAD" => Some("HEAD".to_string()),
        _ => None,
    }
}

/// Target bodies are written as plain text in YAML.
mod text_body {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(body: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match body {
            Some(bytes) => serializer.serialize_some(&String::from_utf8_lossy(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?.map(String::into_bytes))
    }
}
