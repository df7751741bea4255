use planbridge_plan::{RowType, Type};
use planbridge_runner::{
    DriverError, PrestoEngine, ProtocolError, QueryResults, ReferenceConfig, ReferenceRunner,
    ResultColumn, SparkEngine, StagedInput, StagingWriter, StatementTransport, StreamingTransport,
    Translation, TranslationOutcome, STAGING_PATH_QUERY,
};
use planbridge_sql::DialectKind;
use planbridge_substrait::builder::{self, PlanBuilder};
use planbridge_substrait::proto::{join_rel::JoinType, AggregationPhase, Plan};
use serde_json::{json, Value as JsonValue};

const GTE: u32 = 1;
const SUM: u32 = 2;
const EQUAL: u32 = 3;

const AGGREGATE_SQL: &str = "SELECT n0_0, sum(n0_1) as n1_1 FROM \
     (SELECT k as n0_0, v as n0_1 FROM tmp WHERE v >= 0) GROUP BY n0_0";

/// Answers every statement from a fixed table and records what was sent.
#[derive(Default)]
struct FakeCoordinator {
    statements: Vec<String>,
    fail_on: Option<String>,
}

impl StatementTransport for FakeCoordinator {
    fn start_query(&mut self, sql: &str) -> anyhow::Result<String> {
        self.statements.push(sql.to_string());
        let id = format!("q{}", self.statements.len());

        let body = if self.fail_on.as_deref() == Some(sql) {
            json!({"id": id, "error": {"errorCode": 47, "message": "Function not registered"}})
        } else if sql == STAGING_PATH_QUERY {
            json!({
                "id": id,
                "columns": [{"name": "$path", "type": "varchar"}],
                "data": [["file:/warehouse/tpch/tmp/20260101_000000_0"]]
            })
        } else if sql.starts_with("SELECT") {
            json!({"id": id, "nextUri": format!("http://coordinator/v1/statement/{id}/1")})
        } else {
            json!({"id": id})
        };
        Ok(body.to_string())
    }

    fn fetch_next(&mut self, next_uri: &str) -> anyhow::Result<String> {
        let id = next_uri
            .trim_start_matches("http://coordinator/v1/statement/")
            .trim_end_matches("/1");
        Ok(json!({
            "id": id,
            "columns": [{"name": "n0_0", "type": "integer"}, {"name": "n1_1", "type": "bigint"}],
            "data": [[1, 10], [2, 20]]
        })
        .to_string())
    }
}

/// Streams one batch per statement and records what was sent.
#[derive(Default)]
struct FakeSparkSession {
    statements: Vec<String>,
}

impl StreamingTransport for FakeSparkSession {
    type Stream<'a> = std::vec::IntoIter<anyhow::Result<QueryResults>>;

    fn execute(&mut self, sql: &str) -> anyhow::Result<Self::Stream<'_>> {
        self.statements.push(sql.to_string());
        let id = format!("s{}", self.statements.len());
        if !sql.starts_with("SELECT") {
            return Ok(Vec::new().into_iter());
        }
        let columns = vec![
            ResultColumn {
                name: "n0_0".to_string(),
                type_name: "integer".to_string(),
            },
            ResultColumn {
                name: "n1_1".to_string(),
                type_name: "bigint".to_string(),
            },
        ];
        let batch = |rows: Vec<Vec<JsonValue>>| -> anyhow::Result<QueryResults> {
            Ok(QueryResults {
                query_id: id.clone(),
                columns: columns.clone(),
                rows,
            })
        };
        Ok(vec![
            batch(vec![vec![json!(1), json!(10)]]),
            batch(vec![vec![json!(2), json!(20)]]),
        ]
        .into_iter())
    }
}

/// Records directory writes and hands out numbered Parquet paths.
#[derive(Default)]
struct RecordingWriter {
    writes: Vec<(String, StagedInput)>,
    files: Vec<StagedInput>,
}

impl StagingWriter for RecordingWriter {
    fn write_into(&mut self, directory: &str, input: &StagedInput) -> anyhow::Result<()> {
        self.writes.push((directory.to_string(), input.clone()));
        Ok(())
    }

    fn write_file(&mut self, input: &StagedInput) -> anyhow::Result<String> {
        self.files.push(input.clone());
        Ok(format!("/scratch/input-{}.parquet", self.files.len()))
    }
}

fn aggregate_plan() -> Plan {
    let read = builder::read(
        "t",
        &[("k", builder::i32_type()), ("v", builder::i64_type())],
        Some(builder::call(
            GTE,
            vec![builder::field(1), builder::lit_i32(0)],
            builder::bool_type(),
        )),
    );
    let rel = builder::aggregate(
        read,
        vec![builder::field(0)],
        vec![builder::measure(
            SUM,
            vec![builder::field(1)],
            Some(builder::i64_type()),
            AggregationPhase::InitialToResult,
        )],
    );
    PlanBuilder::new()
        .function(GTE, "gte:i64_i32")
        .function(SUM, "sum:i64")
        .root(rel, &["k", "s"])
        .build()
}

fn input() -> StagedInput {
    StagedInput::new(
        RowType::from_pairs([("k", Type::Integer), ("v", Type::BigInt)]),
        vec![vec![json!(1), json!(10)], vec![json!(2), json!(20)]],
    )
}

fn config(dialect: DialectKind) -> ReferenceConfig {
    ReferenceConfig {
        dialect,
        ..ReferenceConfig::default()
    }
}

fn presto_runner() -> ReferenceRunner<PrestoEngine<FakeCoordinator>, RecordingWriter> {
    ReferenceRunner::new(
        &config(DialectKind::Presto),
        PrestoEngine::new(FakeCoordinator::default()),
        RecordingWriter::default(),
    )
    .unwrap()
}

fn spark_runner() -> ReferenceRunner<SparkEngine<FakeSparkSession>, RecordingWriter> {
    ReferenceRunner::new(
        &config(DialectKind::Spark),
        SparkEngine::new(FakeSparkSession::default()),
        RecordingWriter::default(),
    )
    .unwrap()
}

#[test]
fn ready_plan_is_staged_then_run() {
    let mut runner = presto_runner();
    let results = runner.run(&aggregate_plan(), &input()).unwrap().unwrap();

    assert_eq!(results.rows, vec![vec![json!(1), json!(10)], vec![json!(2), json!(20)]]);
    assert_eq!(results.columns.len(), 2);

    let statements = &runner.engine().transport().statements;
    assert_eq!(statements.len(), 5);
    assert_eq!(statements[0], "DROP TABLE IF EXISTS tmp");
    assert!(statements[1].starts_with("CREATE TABLE tmp(k, v)"));
    assert_eq!(statements[2], STAGING_PATH_QUERY);
    assert_eq!(statements[3], "DELETE FROM tmp");
    assert_eq!(statements[4], AGGREGATE_SQL);

    let writes = &runner.writer().writes;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "/warehouse/tpch/tmp");
    assert_eq!(writes[0].1, input());
}

#[test]
fn unsupported_plan_never_reaches_the_transport() {
    let left = builder::read("l", &[("a", builder::i32_type())], None);
    let right = builder::read("r", &[("b", builder::i32_type())], None);
    let join = builder::join(
        left,
        right,
        builder::call(EQUAL, vec![builder::field(0), builder::field(1)], builder::bool_type()),
        JoinType::Inner,
    );
    let plan = PlanBuilder::new()
        .function(EQUAL, "equal:i32_i32")
        .root(join, &["a", "b"])
        .build();

    let mut runner = presto_runner();
    assert_eq!(
        runner.translation().prepare(&plan).unwrap(),
        TranslationOutcome::Unsupported
    );
    assert!(runner.run(&plan, &input()).unwrap().is_none());
    assert!(runner.engine().transport().statements.is_empty());
    assert!(runner.writer().writes.is_empty());
}

#[test]
fn plan_without_sql_is_not_submitted() {
    let read = builder::read("t", &[("d", builder::date_type())], None);
    let plan = PlanBuilder::new().root(read, &["d"]).build();

    let translation = Translation::new(DialectKind::Presto);
    let outcome = translation.prepare(&plan).unwrap();
    assert!(matches!(outcome, TranslationOutcome::NoSql(_)));
    assert!(outcome.sql().is_none());

    let mut runner = presto_runner();
    assert!(runner.run(&plan, &input()).unwrap().is_none());
    assert!(runner.engine().transport().statements.is_empty());
}

#[test]
fn same_plan_translates_identically_per_dialect() {
    let plan = aggregate_plan();
    let presto = Translation::new(DialectKind::Presto);
    let spark = Translation::new(DialectKind::Spark);

    assert_eq!(presto.prepare(&plan).unwrap().sql(), Some(AGGREGATE_SQL));
    assert_eq!(spark.prepare(&plan).unwrap().sql(), Some(AGGREGATE_SQL));
    assert_eq!(presto.prepare(&plan).unwrap(), presto.prepare(&plan).unwrap());
}

#[test]
fn query_failure_surfaces_as_protocol_error() {
    let mut runner = ReferenceRunner::new(
        &config(DialectKind::Presto),
        PrestoEngine::new(FakeCoordinator {
            fail_on: Some(AGGREGATE_SQL.to_string()),
            ..FakeCoordinator::default()
        }),
        RecordingWriter::default(),
    )
    .unwrap();

    let err = runner.run(&aggregate_plan(), &input()).unwrap_err();
    assert!(matches!(
        err,
        DriverError::Protocol(ProtocolError::QueryFailed { error_code: 47, .. })
    ));
    // Staging completed before the failing statement.
    assert_eq!(runner.writer().writes.len(), 1);
}

#[test]
fn empty_input_is_staged_with_placeholder_column() {
    let mut runner = presto_runner();
    let empty = StagedInput::new(RowType::default(), vec![vec![]]);
    runner.stage(&empty).unwrap();

    let statements = &runner.engine().transport().statements;
    assert!(statements[1].starts_with("CREATE TABLE tmp(x)"));
    assert_eq!(runner.writer().writes[0].1.rows, vec![vec![JsonValue::Null]]);
}

#[test]
fn spark_stages_a_parquet_view_and_streams() {
    let mut runner = spark_runner();
    let results = runner.run(&aggregate_plan(), &input()).unwrap().unwrap();

    assert_eq!(results.rows, vec![vec![json!(1), json!(10)], vec![json!(2), json!(20)]]);
    assert_eq!(results.query_id, "s2");

    let statements = &runner.engine().transport().statements;
    assert_eq!(
        statements,
        &vec![
            "CREATE OR REPLACE TEMPORARY VIEW tmp AS \
             (SELECT * from parquet.`file:///scratch/input-1.parquet`)"
                .to_string(),
            AGGREGATE_SQL.to_string(),
        ]
    );
    assert_eq!(runner.writer().files, vec![input()]);
    assert!(runner.writer().writes.is_empty());
}

#[test]
fn spark_empty_input_is_staged_with_placeholder_column() {
    let mut runner = spark_runner();
    runner.stage(&StagedInput::new(RowType::default(), vec![vec![], vec![]])).unwrap();

    let staged = &runner.writer().files[0];
    assert_eq!(staged.row_type.names().collect::<Vec<_>>(), vec!["x"]);
    assert_eq!(staged.rows, vec![vec![JsonValue::Null], vec![JsonValue::Null]]);
}

#[test]
fn engine_must_match_configured_dialect() {
    let err = ReferenceRunner::new(
        &config(DialectKind::Spark),
        PrestoEngine::new(FakeCoordinator::default()),
        RecordingWriter::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(
        err,
        DriverError::DialectMismatch {
            configured: DialectKind::Spark,
            engine: DialectKind::Presto,
        }
    ));
}
