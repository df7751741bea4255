//! Validate → convert → emit, then run against the reference engine
//!
//! Validation always finishes before the transport sees any statement for
//! the same plan.

use crate::config::ReferenceConfig;
use crate::engine::ReferenceEngine;
use crate::protocol::{ProtocolError, QueryResults};
use planbridge_plan::{PlanNode, RowType, Type};
use planbridge_sql::{DialectKind, SqlEmitter, SqlError, EMPTY_INPUT_COLUMN};
use planbridge_substrait::{decode_plan, is_supported, proto, ConvertError, SubstraitPlanConverter};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Staging table location not returned by the reference engine")]
    MissingStagingPath,

    #[error("Failed to write staging data: {0}")]
    Staging(anyhow::Error),

    #[error("Configured for {configured} but the reference engine speaks {engine}")]
    DialectMismatch {
        configured: DialectKind,
        engine: DialectKind,
    },
}

/// What a plan turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationOutcome {
    /// Rejected by the validator; nothing was converted.
    Unsupported,
    /// Converted, but the dialect cannot express it.
    NoSql(PlanNode),
    Ready { plan: PlanNode, sql: String },
}

impl TranslationOutcome {
    pub fn sql(&self) -> Option<&str> {
        match self {
            TranslationOutcome::Ready { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

pub struct Translation {
    emitter: SqlEmitter,
}

impl Translation {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            emitter: SqlEmitter::for_kind(dialect),
        }
    }

    pub fn dialect(&self) -> DialectKind {
        self.emitter.dialect().kind()
    }

    pub fn prepare(&self, plan: &proto::Plan) -> Result<TranslationOutcome, ConvertError> {
        if !is_supported(plan) {
            info!(dialect = %self.dialect(), "Plan rejected by validator");
            return Ok(TranslationOutcome::Unsupported);
        }

        let node = SubstraitPlanConverter::convert_plan(plan)?;
        debug!(
            root = node.kind_name(),
            fingerprint = %node.fingerprint(),
            "Plan converted"
        );

        Ok(match self.emitter.to_sql(&node) {
            Some(sql) => TranslationOutcome::Ready { plan: node, sql },
            None => {
                info!(
                    dialect = %self.dialect(),
                    root = node.kind_name(),
                    "No SQL for converted plan"
                );
                TranslationOutcome::NoSql(node)
            }
        })
    }

    pub fn prepare_bytes(&self, bytes: &[u8]) -> Result<TranslationOutcome, ConvertError> {
        self.prepare(&decode_plan(bytes)?)
    }
}

/// Input rows destined for the staging table.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedInput {
    pub row_type: RowType,
    pub rows: Vec<Vec<JsonValue>>,
}

impl StagedInput {
    pub fn new(row_type: RowType, rows: Vec<Vec<JsonValue>>) -> Self {
        Self { row_type, rows }
    }

    /// A zero-column input becomes one nullable BIGINT column with a null
    /// per row, matching the staging DDL.
    pub fn for_staging(&self) -> StagedInput {
        if !self.row_type.is_empty() {
            return self.clone();
        }
        StagedInput {
            row_type: RowType::from_pairs([(EMPTY_INPUT_COLUMN, Type::BigInt)]),
            rows: self.rows.iter().map(|_| vec![JsonValue::Null]).collect(),
        }
    }
}

/// Writes staged rows to files a reference engine can read.
pub trait StagingWriter {
    /// Write `input` as a DWRF file inside the staging table's `directory`.
    fn write_into(&mut self, directory: &str, input: &StagedInput) -> anyhow::Result<()>;

    /// Write `input` to a new local Parquet file and return its absolute path.
    fn write_file(&mut self, input: &StagedInput) -> anyhow::Result<String>;
}

/// Drives plans through translation and, when SQL exists, the reference
/// engine.
pub struct ReferenceRunner<E, W> {
    translation: Translation,
    engine: E,
    writer: W,
}

impl<E, W> ReferenceRunner<E, W>
where
    E: ReferenceEngine,
    W: StagingWriter,
{
    /// Fails when `engine` speaks a different dialect than configured.
    pub fn new(config: &ReferenceConfig, engine: E, writer: W) -> Result<Self, DriverError> {
        if engine.dialect() != config.dialect {
            return Err(DriverError::DialectMismatch {
                configured: config.dialect,
                engine: engine.dialect(),
            });
        }
        Ok(Self {
            translation: Translation::new(config.dialect),
            engine,
            writer,
        })
    }

    pub fn translation(&self) -> &Translation {
        &self.translation
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Run `plan` over `input`. `None` means the reference engine was not
    /// consulted.
    pub fn run(
        &mut self,
        plan: &proto::Plan,
        input: &StagedInput,
    ) -> Result<Option<QueryResults>, DriverError> {
        match self.translation.prepare(plan)? {
            TranslationOutcome::Unsupported => Ok(None),
            TranslationOutcome::NoSql(node) => {
                warn!(root = node.kind_name(), "Skipping reference run");
                Ok(None)
            }
            TranslationOutcome::Ready { sql, .. } => {
                self.stage(input)?;
                let results = self.engine.execute(&sql)?;
                info!(
                    dialect = %self.engine.dialect(),
                    query_id = %results.query_id,
                    rows = results.num_rows(),
                    "Reference run finished"
                );
                Ok(Some(results))
            }
        }
    }

    pub fn stage(&mut self, input: &StagedInput) -> Result<(), DriverError> {
        self.engine.stage(&input.for_staging(), &mut self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_input_gets_placeholder_column() {
        let input = StagedInput::new(RowType::default(), vec![vec![], vec![]]);
        let staged = input.for_staging();
        assert_eq!(staged.row_type.names().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(staged.rows, vec![vec![JsonValue::Null], vec![JsonValue::Null]]);

        let input = StagedInput::new(RowType::from_pairs([("a", Type::Integer)]), vec![vec![json!(1)]]);
        assert_eq!(input.for_staging(), input);
    }

    #[test]
    fn test_prepare_rejects_empty_plan_as_unsupported() {
        let translation = Translation::new(DialectKind::Presto);
        assert_eq!(
            translation.prepare(&proto::Plan::default()).unwrap(),
            TranslationOutcome::Unsupported
        );
        assert!(translation.prepare_bytes(&[0xff, 0xff]).is_err());
    }
}
