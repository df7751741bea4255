//! SQL emission for reference engines
//!
//! Translates `planbridge_plan` trees into SQL text that a reference engine
//! can run against a staged copy of the input, so results can be compared.

pub mod dialect;
pub mod emitter;

pub use dialect::{get_dialect, DialectKind, PrestoDialect, SparkDialect, SqlDialect};
pub use emitter::{
    spark_staging_view, staging_ddl, to_type_sql, SqlEmitter, StagingDdl, EMPTY_INPUT_COLUMN,
    STAGING_TABLE,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("Unknown SQL dialect: {0}")]
    UnknownDialect(String),

    #[error("Column '{column}' of type {data_type} cannot be staged")]
    UnsupportedStagingType { column: String, data_type: String },

    #[error("Cannot stage from file path '{0}'")]
    UnsupportedStagingPath(String),
}
