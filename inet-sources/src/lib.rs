//! External sources an enrichment run cross-references rows against.
//!
//! - [`registry`]: the [`RegistrySearch`] trait and query/range types
//! - [`epo`]: EPO Open Patent Services (applicant/inventor search via CQL)
//! - [`companies_house`]: Companies House company and officer search
//! - [`middleware`]: caching and throttling wrappers, composed by
//!   [`build_registry_stack`]
//! - [`matcher`]: the entity-matching surface
pub mod companies_house;
pub mod epo;
pub mod matcher;
pub mod middleware;
pub mod registry;

pub use companies_house::CompaniesHouseClient;
pub use epo::{cql_for, OpsClient};
pub use matcher::{EntityMatch, EntityMatcher, MatchOutcome, MatcherSet, UnsupportedMatcher};
pub use middleware::{build_registry_stack, CachedSearch, ThrottledSearch};
pub use registry::{
    applicant_search, inventor_search, QueryKind, RegistryKind, RegistryQuery, RegistrySearch,
    ResultRange,
};
