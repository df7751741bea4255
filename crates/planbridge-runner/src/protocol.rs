//! Reference engine statement protocol
//!
//! A statement is posted once; the coordinator answers with a JSON body that
//! may carry a page of rows and a `nextUri` to poll for the rest. The HTTP
//! client itself lives behind [`StatementTransport`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Transport failed: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Query {query_id} failed with error {error_code}: {message}")]
    QueryFailed {
        query_id: String,
        error_code: i64,
        message: String,
    },
}

/// Blocking HTTP client used by [`execute_statement`].
pub trait StatementTransport {
    /// Submit `sql` as a new statement and return the response body.
    fn start_query(&mut self, sql: &str) -> anyhow::Result<String>;

    /// Poll `next_uri` and return the response body.
    fn fetch_next(&mut self, next_uri: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    pub error_code: i64,
    pub message: String,
}

/// One page of the statement protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ResultColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Vec<JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
}

impl StatementResponse {
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Turn an error payload into [`ProtocolError::QueryFailed`].
    pub fn into_result(self) -> Result<Self, ProtocolError> {
        match self.error {
            Some(error) => Err(ProtocolError::QueryFailed {
                query_id: self.id,
                error_code: error.error_code,
                message: error.message,
            }),
            None => Ok(self),
        }
    }
}

/// Rows accumulated across every page of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResults {
    pub query_id: String,
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl QueryResults {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn absorb(&mut self, page: StatementResponse) {
        if self.query_id.is_empty() {
            self.query_id = page.id;
        }
        if self.columns.is_empty() {
            self.columns = page.columns;
        }
        self.rows.extend(page.data);
    }
}

/// Run `sql` to completion, following `nextUri` until the coordinator stops
/// returning one.
pub fn execute_statement<T>(transport: &mut T, sql: &str) -> Result<QueryResults, ProtocolError>
where
    T: StatementTransport + ?Sized,
{
    debug!(sql = %sql, "Submitting statement");

    let mut page = StatementResponse::parse(&transport.start_query(sql)?)?.into_result()?;
    let mut results = QueryResults::default();
    let mut pages = 1usize;

    loop {
        let next_uri = page.next_uri.take();
        results.absorb(page);

        let Some(next_uri) = next_uri else {
            break;
        };
        trace!(next_uri = %next_uri, "Polling statement");
        page = StatementResponse::parse(&transport.fetch_next(&next_uri)?)?.into_result()?;
        pages += 1;
    }

    debug!(
        query_id = %results.query_id,
        pages,
        rows = results.num_rows(),
        "Statement finished"
    );
    Ok(results)
}

/// Single-shot transport that streams result batches instead of paging.
pub trait StreamingTransport {
    type Stream<'a>: Iterator<Item = anyhow::Result<QueryResults>>
    where
        Self: 'a;

    fn execute(&mut self, sql: &str) -> anyhow::Result<Self::Stream<'_>>;
}

/// Drain a streaming transport into one result set.
pub fn collect_stream<T>(transport: &mut T, sql: &str) -> Result<QueryResults, ProtocolError>
where
    T: StreamingTransport,
{
    debug!(sql = %sql, "Streaming statement");

    let mut results = QueryResults::default();
    let mut batches = 0usize;
    for batch in transport.execute(sql)? {
        let batch = batch?;
        if results.columns.is_empty() {
            results.columns = batch.columns;
        }
        if results.query_id.is_empty() {
            results.query_id = batch.query_id;
        }
        results.rows.extend(batch.rows);
        batches += 1;
    }

    debug!(batches, rows = results.num_rows(), "Stream finished");
    Ok(results)
}
