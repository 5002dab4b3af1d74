//! Applications (tenants) and their validation rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

use crate::auth::{generate_api_key, generate_app_id, mask_api_key};
use crate::error::{Error, Result};
use crate::limits::{MAX_APP_NAME_LEN, MAX_DESCRIPTION_LEN, MAX_DOMAIN_LEN};

/// A registered third-party site.
///
/// `api_key` is serialized (the cache snapshot and the create response need
/// it) but `Debug` masks it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub app_id: String,
    pub api_key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub domain: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("app_id", &self.app_id)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("name", &self.name)
            .field("description", &self.description)
            .field("domain", &self.domain)
            .field("active", &self.active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Lifecycle position of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Active,
    Inactive,
}

impl Application {
    /// Build a new active application with server-assigned ID and key.
    pub fn new(request: CreateApplication) -> Self {
        let now = Utc::now();
        Self {
            app_id: generate_app_id(),
            api_key: generate_api_key().into_inner(),
            name: request.name.trim().to_string(),
            description: request.description.filter(|d| !d.trim().is_empty()),
            domain: normalize_domain(&request.domain),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fill in a missing ID or key, as the repository contract allows
    /// callers to leave them empty.
    pub fn assign_identity(&mut self) {
        if self.app_id.is_empty() {
            self.app_id = generate_app_id();
        }
        if self.api_key.is_empty() {
            self.api_key = generate_api_key().into_inner();
        }
    }

    pub fn status(&self) -> ApplicationStatus {
        if self.active {
            ApplicationStatus::Active
        } else {
            ApplicationStatus::Inactive
        }
    }

    /// Reject ingestion for inactive tenants.
    pub fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(Error::ApplicationInactive(self.app_id.clone()))
        }
    }
}

/// Body of `POST /v1/applications`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateApplication {
    #[validate(length(min = 1, max = 255), custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_domain"))]
    pub domain: String,
}

impl CreateApplication {
    /// Validate and map validator failures to a `VALIDATION_FAILED` error.
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(Error::from)
    }
}

/// Body of `PUT /v1/applications/:id`. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateApplication {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl UpdateApplication {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.domain.is_none()
            && self.active.is_none()
    }

    /// Validate only the fields that are present.
    pub fn check(&self) -> Result<()> {
        let mut details = Vec::new();

        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                details.push("name: must not be blank".to_string());
            } else if name.chars().count() > MAX_APP_NAME_LEN {
                details.push(format!("name: must be at most {} characters", MAX_APP_NAME_LEN));
            }
        }
        if let Some(ref description) = self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                details.push(format!(
                    "description: must be at most {} characters",
                    MAX_DESCRIPTION_LEN
                ));
            }
        }
        if let Some(ref domain) = self.domain {
            if let Err(e) = validate_domain(domain) {
                details.push(format!("domain: {}", e.message.unwrap_or(e.code)));
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(Error::validation_with_details("Validation failed", details))
        }
    }

    /// Apply the present fields and bump `updated_at`.
    pub fn apply_to(self, app: &mut Application) {
        if let Some(name) = self.name {
            app.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            app.description = if description.trim().is_empty() {
                None
            } else {
                Some(description)
            };
        }
        if let Some(domain) = self.domain {
            app.domain = normalize_domain(&domain);
        }
        if let Some(active) = self.active {
            app.active = active;
        }
        app.updated_at = Utc::now();
    }
}

fn validate_not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Relaxed DNS check: at least one dot, no whitespace, bounded length,
/// no empty leading or trailing label.
pub fn validate_domain(domain: &str) -> std::result::Result<(), ValidationError> {
    let domain = domain.trim();
    let reason = if domain.is_empty() {
        Some("must not be empty")
    } else if domain.len() > MAX_DOMAIN_LEN {
        Some("must be at most 253 characters")
    } else if domain.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else if !domain.contains('.') {
        Some("must contain at least one dot")
    } else if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        Some("must not contain empty labels")
    } else {
        None
    };

    match reason {
        Some(msg) => {
            let mut err = ValidationError::new("domain");
            err.message = Some(msg.into());
            Err(err)
        }
        None => Ok(()),
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().to_ascii_lowercase()
}
