//! Error types raised while translating queries and generating statements.

use thiserror::Error;

/// Configuration errors detected before any statement text reaches the database.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// A primary-key driven rewrite was required but the entity declares no key.
    #[error("{entity} does not declare any primary key fields")]
    MissingPrimaryKey { entity: String },

    /// A join without explicit criteria could not derive any relation.
    #[error("no relation fields are declared between {source_entity} and {target_entity}")]
    MissingRelation {
        source_entity: String,
        target_entity: String,
    },

    /// A subquery used as a criterion value must project exactly one field.
    #[error("subquery over {entity} must select exactly one field, found {found}")]
    SubqueryField { entity: String, found: usize },

    /// An engine-assigned key cannot coexist with a partition key in one insert.
    #[error("auto increment field cannot be used together with split field on {entity}")]
    IncrementWithSplit { entity: String },

    /// The aggregate needs a target field and none could be resolved.
    #[error("no field is available for the {function} aggregate on {entity}")]
    MissingAggregateField { function: String, entity: String },

    /// An update command carried no field assignment.
    #[error("no update field is set for {entity}")]
    EmptyAssignment { entity: String },

    /// The catalog returned no physical table for the entity.
    #[error("failed to resolve a table name for {entity}")]
    MissingTable { entity: String },

    /// The criterion value does not fit its operator.
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// A raw-text query was used where structured translation is required.
    #[error("raw text query over {entity} cannot be used as {usage}")]
    RawQuery { entity: String, usage: &'static str },

    /// Table creation needs at least one declared field.
    #[error("no fields are declared for {entity}")]
    MissingFields { entity: String },
}

impl DispatchError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for translation and statement generation.
pub type DispatchResult<T> = Result<T, DispatchError>;
