//! Request authorization, selected once per configuration load

use std::collections::HashSet;

use http::{HeaderMap, HeaderName};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use super::certificate::{self, RootVerifier};
use super::subject;
use crate::config::AuthorizationSettings;

/// Structured refusal handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub code: u16,
    pub message: String,
}

impl Denial {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Reverse proxy terminates TLS and forwards the raw client certificate.
#[derive(Debug, Clone)]
pub struct ClientCertPolicy {
    pub header: HeaderName,
    pub root: RootVerifier,
    pub allowed_users: HashSet<String>,
}

/// Reverse proxy verifies the client itself and forwards the subject DN.
#[derive(Debug, Clone)]
pub struct ClientCertInfoPolicy {
    pub header: HeaderName,
    /// Lowercased, matching how the subject's common name is compared.
    pub allowed_users: HashSet<String>,
}

#[derive(Debug, Clone)]
pub enum Authorizer {
    Open,
    ClientCert(ClientCertPolicy),
    ClientCertInfo(ClientCertInfoPolicy),
    /// Every request is refused with a 500 until the configuration is fixed.
    Misconfigured { message: String },
}

impl Authorizer {
    pub fn from_settings(settings: &AuthorizationSettings) -> Self {
        match settings.kind.as_str() {
            "" | "none" => Authorizer::Open,
            "client-cert" => {
                let header = match parse_header(&settings.header) {
                    Ok(header) => header,
                    Err(authorizer) => return authorizer,
                };
                let Some(path) = settings.cert.as_deref() else {
                    return misconfigured("Root certificate not configured");
                };
                match RootVerifier::from_file(path) {
                    Ok(root) => Authorizer::ClientCert(ClientCertPolicy {
                        header,
                        root,
                        allowed_users: settings.users.iter().cloned().collect(),
                    }),
                    Err(message) => {
                        error!(path = %path.display(), "{}", message);
                        Authorizer::Misconfigured { message }
                    }
                }
            }
            "client-cert-info" => {
                let header = match parse_header(&settings.header) {
                    Ok(header) => header,
                    Err(authorizer) => return authorizer,
                };
                Authorizer::ClientCertInfo(ClientCertInfoPolicy {
                    header,
                    allowed_users: settings.users.iter().map(|u| u.to_lowercase()).collect(),
                })
            }
            other => {
                error!("Unknown authorization type: {}", other);
                misconfigured("Invalid authorization configuration")
            }
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Authorizer::Open => "none",
            Authorizer::ClientCert(_) => "client-cert",
            Authorizer::ClientCertInfo(_) => "client-cert-info",
            Authorizer::Misconfigured { .. } => "invalid",
        }
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), Denial> {
        match self {
            Authorizer::Open => Ok(()),
            Authorizer::ClientCert(policy) => policy.authorize(headers),
            Authorizer::ClientCertInfo(policy) => policy.authorize(headers),
            Authorizer::Misconfigured { message } => Err(Denial::new(500, message.clone())),
        }
    }

    /// Debug detail for the verbose status report.
    pub fn describe(&self) -> serde_json::Value {
        match self {
            Authorizer::Open => json!({ "type": self.mode() }),
            Authorizer::ClientCert(policy) => json!({
                "type": self.mode(),
                "header": policy.header.as_str(),
                "allowedUsers": policy.allowed_users.len(),
            }),
            Authorizer::ClientCertInfo(policy) => json!({
                "type": self.mode(),
                "header": policy.header.as_str(),
                "allowedUsers": policy.allowed_users.len(),
            }),
            Authorizer::Misconfigured { message } => json!({
                "type": self.mode(),
                "error": message,
            }),
        }
    }
}

impl ClientCertPolicy {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Denial> {
        let certificate = certificate::decode_certificate(header_value(headers, &self.header))?;
        let common_name = certificate::common_name(&certificate)?;

        self.root.verify(&certificate)?;

        if self.allowed_users.is_empty() {
            return Ok(());
        }

        match common_name {
            Some(name) if self.allowed_users.contains(&name) => Ok(()),
            _ => Err(Denial::new(403, "User not authorized")),
        }
    }
}

impl ClientCertInfoPolicy {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Denial> {
        let subject = header_value(headers, &self.header);
        if subject.is_empty() {
            return Err(Denial::new(401, "Client not authenticated"));
        }

        let user = subject::common_name(subject)
            .ok_or_else(|| Denial::new(401, "Client not authenticated"))?;

        if self.allowed_users.is_empty() || self.allowed_users.contains(&user) {
            Ok(())
        } else {
            Err(Denial::new(403, "User not authorized"))
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

fn parse_header(name: &str) -> Result<HeaderName, Authorizer> {
    HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| {
        error!("Invalid authorization header name: {:?}", name);
        misconfigured("Invalid authorization configuration")
    })
}

fn misconfigured(message: &str) -> Authorizer {
    Authorizer::Misconfigured {
        message: message.to_string(),
    }
}
