//! Reference engines
//!
//! Each engine knows how to make the input visible as `tmp` and how to run
//! a statement over its own transport. Presto recreates a DWRF table and
//! polls; Spark points a temporary view at a Parquet file and streams.

use crate::driver::{DriverError, StagedInput, StagingWriter};
use crate::protocol::{
    collect_stream, execute_statement, QueryResults, StatementTransport, StreamingTransport,
};
use planbridge_sql::{spark_staging_view, staging_ddl, DialectKind};
use tracing::debug;

/// Returns the file backing the Presto staging table.
pub const STAGING_PATH_QUERY: &str = "SELECT \"$path\" FROM tmp";

pub trait ReferenceEngine {
    fn dialect(&self) -> DialectKind;

    /// Make `input` readable as `tmp`.
    fn stage(&mut self, input: &StagedInput, writer: &mut dyn StagingWriter) -> Result<(), DriverError>;

    fn execute(&mut self, sql: &str) -> Result<QueryResults, DriverError>;
}

/// Presto over the polling statement protocol.
pub struct PrestoEngine<T> {
    transport: T,
}

impl<T: StatementTransport> PrestoEngine<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: StatementTransport> ReferenceEngine for PrestoEngine<T> {
    fn dialect(&self) -> DialectKind {
        DialectKind::Presto
    }

    /// Recreate `tmp` with the input's schema, empty it, and write the rows
    /// into its directory.
    fn stage(&mut self, input: &StagedInput, writer: &mut dyn StagingWriter) -> Result<(), DriverError> {
        let ddl = staging_ddl(&input.row_type)?;

        execute_statement(&mut self.transport, &ddl.drop)?;
        execute_statement(&mut self.transport, &ddl.create)?;
        let location = execute_statement(&mut self.transport, STAGING_PATH_QUERY)?;
        execute_statement(&mut self.transport, &ddl.delete)?;

        let directory = staging_directory(&location).ok_or(DriverError::MissingStagingPath)?;
        debug!(directory = %directory, rows = input.rows.len(), "Writing staging data");
        writer
            .write_into(&directory, input)
            .map_err(DriverError::Staging)
    }

    fn execute(&mut self, sql: &str) -> Result<QueryResults, DriverError> {
        Ok(execute_statement(&mut self.transport, sql)?)
    }
}

/// Spark over the single-shot streaming protocol.
pub struct SparkEngine<T> {
    transport: T,
}

impl<T: StreamingTransport> SparkEngine<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: StreamingTransport> ReferenceEngine for SparkEngine<T> {
    fn dialect(&self) -> DialectKind {
        DialectKind::Spark
    }

    /// Write the rows to a fresh Parquet file and point `tmp` at it.
    fn stage(&mut self, input: &StagedInput, writer: &mut dyn StagingWriter) -> Result<(), DriverError> {
        let path = writer.write_file(input).map_err(DriverError::Staging)?;
        debug!(path = %path, rows = input.rows.len(), "Staged input file");
        collect_stream(&mut self.transport, &spark_staging_view(&path)?)?;
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<QueryResults, DriverError> {
        Ok(collect_stream(&mut self.transport, sql)?)
    }
}

/// Directory of the first file returned by [`STAGING_PATH_QUERY`], without
/// a `file:` scheme.
fn staging_directory(results: &QueryResults) -> Option<String> {
    let path = results.rows.first()?.first()?.as_str()?;
    let path = path.strip_prefix("file:").unwrap_or(path);
    let (directory, _) = path.rsplit_once('/')?;
    Some(directory.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};

    fn location(path: JsonValue) -> QueryResults {
        QueryResults {
            query_id: "q".to_string(),
            columns: vec![],
            rows: vec![vec![path]],
        }
    }

    #[test]
    fn test_staging_directory() {
        assert_eq!(
            staging_directory(&location(json!("file:/warehouse/tmp/20240101_0001"))).as_deref(),
            Some("/warehouse/tmp")
        );
        assert_eq!(
            staging_directory(&location(json!("hdfs://nn/tmp/part-0"))).as_deref(),
            Some("hdfs://nn/tmp")
        );
        assert!(staging_directory(&location(json!(null))).is_none());
        assert!(staging_directory(&QueryResults::default()).is_none());
    }
}
