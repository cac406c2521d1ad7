use common_kafka::kafka_consumer::{OffsetErr, RecvErr};
use common_kafka::kafka_producer::KafkaProduceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load {path}: {source}")]
    EnvFile {
        path: String,
        source: dotenvy::Error,
    },
    #[error(transparent)]
    Env(#[from] envconfig::Error),
    #[error("empty {0}")]
    Empty(&'static str),
    #[error("invalid metrics bind host: {0}")]
    BindHost(#[from] std::net::AddrParseError),
}

/// Failures talking to the legacy store.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("legacy store is unreachable: {0}")]
    Connectivity(#[source] sqlx::Error),
    #[error("legacy store query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("failed to decode discipline row: {0}")]
    Decode(#[source] sqlx::Error),
}

impl From<sqlx::Error> for ExtractError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. } => ExtractError::Decode(error),
            other => ExtractError::Query(other),
        }
    }
}

#[derive(Error, Debug)]
#[error("failed to publish batch of {batch_size} disciplines: {source}")]
pub struct PublishError {
    pub batch_size: usize,
    #[source]
    pub source: KafkaProduceError,
}

/// The first failure of one import run.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

#[derive(Error, Debug)]
pub enum EventLoopError {
    #[error("failed to fetch control event: {0}")]
    Fetch(#[from] RecvErr),
    #[error("import failed: {0}")]
    Import(#[from] ImportError),
    #[error("failed to commit control event offset: {0}")]
    Commit(#[from] OffsetErr),
    #[error("shutdown requested while waiting for control events")]
    Cancelled,
}
