//! Common types and utilities shared across inet crates.
//!
//! This crate holds the vocabulary every other crate speaks: which kind of
//! entity a dataset row describes, which external source it is being
//! cross-referenced against, the shared error type, and the observability
//! bootstrap. It is intentionally lightweight so that all crates can depend
//! on it without pulling in HTTP or HTML machinery.
//!
//! # Overview
//!
//! - [`EntityKind`] / [`SourceKind`]: the two axes of entity matching
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`InetError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use inet_common::{EntityKind, SourceKind};
//!
//! assert_eq!(EntityKind::Company.to_string(), "company");
//! assert_eq!(SourceKind::CompaniesRegistry.to_string(), "companies-registry");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod observability;

/// What a dataset row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Company,
    Person,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Company, EntityKind::Person];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Company => "company",
            EntityKind::Person => "person",
        })
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown entity kind: {s}"))
    }
}

/// External source an entity can be cross-referenced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Social media (Twitter).
    Social,
    /// UK Companies House.
    CompaniesRegistry,
    /// European Patent Office register.
    PatentRegistry,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Social,
        SourceKind::CompaniesRegistry,
        SourceKind::PatentRegistry,
    ];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Social => "social",
            SourceKind::CompaniesRegistry => "companies-registry",
            SourceKind::PatentRegistry => "patent-registry",
        })
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-");
        SourceKind::ALL
            .into_iter()
            .find(|k| k.to_string().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown source kind: {s}"))
    }
}

/// Error types used across the inet workspace.
#[derive(thiserror::Error, Debug)]
pub enum InetError {
    /// The requested capability has no implementation yet.
    #[error("unsupported: {entity} matching against {source_kind} is not available")]
    Unsupported {
        entity: EntityKind,
        source_kind: SourceKind,
    },

    /// A configuration value could not be turned into a working component.
    #[error("invalid `{key}`: {message}")]
    Config { key: String, message: String },

    /// A registry or other upstream service answered with an error.
    #[error("{origin} failed: {error}")]
    Source {
        origin: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl InetError {
    pub fn config(key: impl Into<String>, message: impl ToString) -> Self {
        InetError::Config {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn upstream(
        origin: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        InetError::Source {
            origin: origin.into(),
            error: Box::new(error),
        }
    }
}

/// Convenient alias for results that use [`InetError`].
pub type Result<T> = std::result::Result<T, InetError>;
