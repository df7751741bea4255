//! Differential-testing runner
//!
//! Feeds Substrait plans through validation, conversion and SQL emission,
//! then runs the emitted SQL on a reference engine over a staged copy of
//! the input.

pub mod config;
pub mod driver;
pub mod engine;
pub mod logging;
pub mod protocol;

pub use config::{Config, ConfigError, LoggingConfig, ReferenceConfig};
pub use driver::{DriverError, ReferenceRunner, StagedInput, StagingWriter, Translation, TranslationOutcome};
pub use engine::{PrestoEngine, ReferenceEngine, SparkEngine, STAGING_PATH_QUERY};
pub use protocol::{
    collect_stream, execute_statement, ProtocolError, QueryResults, ResultColumn, StatementResponse,
    StatementTransport, StreamingTransport,
};
