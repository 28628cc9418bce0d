pub mod average;
pub mod config;
pub mod credits;
pub mod error;
pub mod groups;
pub mod matcher;
pub mod parser;
pub mod remediation;
pub mod types;
pub mod validation;

pub use average::{aggregate, module_average, Aggregate};
pub use config::{
    CatalogGroup, CatalogModule, CreditRule, GroupCatalog, MatchingConfig, NamePattern,
    PassingConfig,
};
pub use credits::{clamp_credits, CreditResolver, DEFAULT_CREDITS, MAX_CREDITS, MIN_CREDITS};
pub use error::GradeError;
pub use groups::GroupAssigner;
pub use matcher::{normalize_name, similarity, ModuleMatcher};
pub use parser::{in_range, parse_grade, MAX_SCORE, MIN_SCORE, MISSING_VALUE};
pub use remediation::{RemediationOverlay, RemediationReport};
pub use types::{
    GradeRow, GroupRecord, ModuleId, ModuleRecord, ResultSet, RetakeRow, OVERALL_GROUP_NAME,
    OVERALL_MODULE_NAME,
};
pub use validation::validate_config;
