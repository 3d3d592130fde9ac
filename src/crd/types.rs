//! Shared types for Astro specifications and status
//!
//! These types are used across the CRD definitions and controller logic.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type used for resource-level lifecycle entries
pub const PHASE_CONDITION: &str = "Phase";

/// Prefix of condition types that track a single star
pub const STAR_CONDITION_PREFIX: &str = "star/";

/// Known star variants
///
/// The CRD keeps `type` as a plain string so resources with an unknown
/// variant can still be read; unknown values are rejected at launch time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StarType {
    /// A container image exposed through a Service
    Docker,
}

impl StarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StarType::Docker => "docker",
        }
    }
}

impl FromStr for StarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker" => Ok(StarType::Docker),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for StarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the workflow graph
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AstroStar {
    /// Unique name of the star within its Astro
    pub name: String,

    /// Star variant, e.g. "docker"
    #[serde(rename = "type")]
    pub star_type: String,

    /// Names of stars that must be ready before this one launches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    // docker variant configuration
    /// Action invoked on the star by the workflow engine
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,

    /// Target of the action (for example a request path)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,

    /// Container image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Port exposed by the container and its Service
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: i32,
}

fn is_zero(port: &i32) -> bool {
    *port == 0
}

impl AstroStar {
    /// Resolve the declared type string into a known variant
    pub fn variant(&self) -> Result<StarType, String> {
        self.star_type.parse()
    }
}

/// Lifecycle phase of an Astro, also used as the status of conditions
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum AstroPhase {
    /// The graph validated and the workflow engine is initialized
    Initialized,
    /// Ready to begin launching stars
    Ready,
    /// At least one star has been launched
    Launched,
    /// Every star is observed ready
    Succeeded,
    /// A star failed and no further progress is possible
    Failed,
}

impl AstroPhase {
    /// Terminal phases never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, AstroPhase::Succeeded | AstroPhase::Failed)
    }
}

impl std::fmt::Display for AstroPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AstroPhase::Initialized => write!(f, "Initialized"),
            AstroPhase::Ready => write!(f, "Ready"),
            AstroPhase::Launched => write!(f, "Launched"),
            AstroPhase::Succeeded => write!(f, "Succeeded"),
            AstroPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// One entry of the append-only condition history
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AstroCondition {
    /// "Phase" for the resource, "star/<name>" for a single star
    #[serde(rename = "type")]
    pub type_: String,
    /// Workflow status
    pub status: AstroPhase,
    /// Last time the condition transitioned (RFC 3339)
    pub last_transition_time: String,
    /// Machine-readable reason for the transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AstroCondition {
    pub fn new(type_: impl Into<String>, status: AstroPhase, now: DateTime<Utc>) -> Self {
        Self {
            type_: type_.into(),
            status,
            last_transition_time: now.to_rfc3339(),
            reason: None,
            message: None,
        }
    }

    /// Create a resource-level lifecycle condition
    pub fn phase(status: AstroPhase, now: DateTime<Utc>) -> Self {
        Self::new(PHASE_CONDITION, status, now)
    }

    /// Create a condition tracking a single star
    pub fn star(star: &str, status: AstroPhase, now: DateTime<Utc>) -> Self {
        Self::new(star_condition_type(star), status, now)
    }

    pub fn with_reason(mut self, reason: &str, message: impl Into<String>) -> Self {
        self.reason = Some(reason.to_string());
        self.message = Some(message.into());
        self
    }
}

/// Condition type for a star
pub fn star_condition_type(star: &str) -> String {
    format!("{}{}", STAR_CONDITION_PREFIX, star)
}

/// Reference to a namespaced object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AstroRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl AstroRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
        }
    }

    pub fn is_set(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    pub fn name_is(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}
