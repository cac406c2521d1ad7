use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use envconfig::Envconfig;

use crate::error::ConfigError;

pub use common_kafka::config::{ConsumerConfig, KafkaConfig};

pub const CONSUMER_GROUP: &str = "secondary-db-disciplines-importer";
pub const META_EVENTS_TOPIC: &str = "meta_events";

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    #[envconfig(from = "SECONDARY_DEKANAT_DB_DSN")]
    pub secondary_dekanat_db_dsn: String,

    // The importer runs one query at a time
    #[envconfig(default = "2")]
    pub max_pg_connections: u32,

    #[envconfig(default = "disciplines")]
    pub kafka_disciplines_topic: String,

    #[envconfig(default = "100")]
    pub write_threshold: usize,

    #[envconfig(from = "METRICS_BIND_HOST", default = "::")]
    pub metrics_host: String,

    #[envconfig(from = "METRICS_BIND_PORT", default = "3301")]
    pub metrics_port: u16,
}

impl Config {
    /// Load `.env` from the working directory when there is one, then read
    /// the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = Path::new(".env");
        if env_file.exists() {
            dotenvy::from_path(env_file).map_err(|source| ConfigError::EnvFile {
                path: env_file.display().to_string(),
                source,
            })?;
        }

        ConsumerConfig::set_defaults(CONSUMER_GROUP, META_EVENTS_TOPIC, false);
        Self::init_from_env()?.validated()
    }

    pub fn from_hashmap(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::init_from_hashmap(env)?.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.secondary_dekanat_db_dsn.trim().is_empty() {
            return Err(ConfigError::Empty("SECONDARY_DEKANAT_DB_DSN"));
        }
        if self.kafka.kafka_hosts.trim().is_empty() {
            return Err(ConfigError::Empty("KAFKA_HOSTS"));
        }
        Ok(self)
    }

    pub fn metrics_bind(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.metrics_host.parse()?;
        Ok(SocketAddr::new(ip, self.metrics_port))
    }
}
