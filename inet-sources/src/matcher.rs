//! Entity matching: cross-referencing dataset rows against a source.
//!
//! No matching strategy ships yet. [`MatcherSet::default`] registers an
//! [`UnsupportedMatcher`] for every (entity, source) pair so callers always
//! get an explicit [`MatchOutcome::Unsupported`] instead of a silent empty
//! result. Real strategies replace entries through [`MatcherSet::register`].
use async_trait::async_trait;
use inet_common::{EntityKind, InetError, SourceKind};
use inet_data::Row;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One candidate link between a dataset row and a record at the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMatch {
    /// Index into the rows passed to [`EntityMatcher::match_rows`].
    pub row_index: usize,
    pub source: SourceKind,
    /// Source-side identifier (handle, company number, publication number).
    pub reference: String,
    /// Confidence in `0.0..=1.0`.
    pub score: f32,
    /// Raw source record backing the match.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub evidence: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum MatchOutcome {
    Matched { matches: Vec<EntityMatch> },
    Unsupported { entity: EntityKind, source: SourceKind },
}

impl MatchOutcome {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, MatchOutcome::Unsupported { .. })
    }

    /// Matches, or [`InetError::Unsupported`].
    pub fn into_result(self) -> inet_common::Result<Vec<EntityMatch>> {
        match self {
            MatchOutcome::Matched { matches } => Ok(matches),
            MatchOutcome::Unsupported { entity, source } => Err(InetError::Unsupported {
                entity,
                source_kind: source,
            }),
        }
    }
}

#[async_trait]
pub trait EntityMatcher: Send + Sync {
    fn entity(&self) -> EntityKind;
    fn source(&self) -> SourceKind;
    async fn match_rows(&self, rows: &[Row]) -> MatchOutcome;
}

/// Placeholder for a pair with no strategy.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedMatcher {
    entity: EntityKind,
    source: SourceKind,
}

impl UnsupportedMatcher {
    pub fn new(entity: EntityKind, source: SourceKind) -> Self {
        Self { entity, source }
    }
}

#[async_trait]
impl EntityMatcher for UnsupportedMatcher {
    fn entity(&self) -> EntityKind {
        self.entity
    }

    fn source(&self) -> SourceKind {
        self.source
    }

    async fn match_rows(&self, rows: &[Row]) -> MatchOutcome {
        tracing::warn!(
            entity=%self.entity,
            source=%self.source,
            rows=rows.len(),
            "match.unsupported"
        );
        MatchOutcome::Unsupported {
            entity: self.entity,
            source: self.source,
        }
    }
}

/// Matchers keyed by (entity, source).
#[derive(Clone)]
pub struct MatcherSet {
    by_pair: HashMap<(EntityKind, SourceKind), Arc<dyn EntityMatcher>>,
}

impl Default for MatcherSet {
    fn default() -> Self {
        let mut set = Self::empty();
        for entity in EntityKind::ALL {
            for source in SourceKind::ALL {
                set.register(Arc::new(UnsupportedMatcher::new(entity, source)));
            }
        }
        set
    }
}

impl MatcherSet {
    pub fn empty() -> Self {
        Self {
            by_pair: HashMap::new(),
        }
    }

    /// Insert `matcher` under its own (entity, source), replacing any previous one.
    pub fn register(&mut self, matcher: Arc<dyn EntityMatcher>) -> &mut Self {
        self.by_pair
            .insert((matcher.entity(), matcher.source()), matcher);
        self
    }

    pub fn get(&self, entity: EntityKind, source: SourceKind) -> Option<Arc<dyn EntityMatcher>> {
        self.by_pair.get(&(entity, source)).cloned()
    }

    /// Run the registered matcher; a missing entry reads as unsupported.
    pub async fn match_rows(&self, entity: EntityKind, source: SourceKind, rows: &[Row]) -> MatchOutcome {
        match self.get(entity, source) {
            Some(matcher) => matcher.match_rows(rows).await,
            None => UnsupportedMatcher::new(entity, source).match_rows(rows).await,
        }
    }
}
