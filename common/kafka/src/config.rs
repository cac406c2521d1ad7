use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "10000000")]
    pub kafka_producer_queue_messages: u32, // Maximum number of messages in the in-memory producer queue

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    // No default: a service that cannot reach the bus should refuse to start
    pub kafka_hosts: String,

    pub kafka_socket_timeout_ms: Option<u32>,

    pub kafka_retry_backoff_ms: Option<u32>,
}

impl KafkaConfig {
    /// Apply the settings shared by producers and consumers.
    pub(crate) fn apply(&self, client_config: &mut rdkafka::ClientConfig) {
        client_config.set("bootstrap.servers", &self.kafka_hosts);

        if let Some(timeout) = self.kafka_socket_timeout_ms {
            client_config.set("socket.timeout.ms", timeout.to_string());
        }

        if let Some(backoff) = self.kafka_retry_backoff_ms {
            client_config.set("retry.backoff.ms", backoff.to_string());
        }

        if self.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };
    }
}

#[derive(Envconfig, Clone)]
pub struct ConsumerConfig {
    pub kafka_consumer_group: String,
    pub kafka_consumer_topic: String,

    // We default to "earliest" for this, but if you're bringing up a new service, you probably want "latest"
    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String, // earliest, latest

    // Consumers that commit explicitly after processing must leave this off,
    // otherwise offsets move before the work they cover is done.
    pub kafka_consumer_auto_commit: bool,

    #[envconfig(default = "10")]
    pub kafka_consumer_fetch_min_bytes: u32,

    #[envconfig(default = "10000")]
    pub kafka_consumer_fetch_max_bytes: u32, // per partition

    #[envconfig(default = "1000")]
    pub kafka_consumer_fetch_wait_max_ms: u32,
}

impl ConsumerConfig {
    /// Because the consumer config is so application specific, we
    /// can't set good defaults in the derive macro, so we expose a way
    /// for users to set them here before init'ing their main config struct
    pub fn set_defaults(consumer_group: &str, consumer_topic: &str, auto_commit: bool) {
        if std::env::var("KAFKA_CONSUMER_GROUP").is_err() {
            std::env::set_var("KAFKA_CONSUMER_GROUP", consumer_group);
        };
        if std::env::var("KAFKA_CONSUMER_TOPIC").is_err() {
            std::env::set_var("KAFKA_CONSUMER_TOPIC", consumer_topic);
        };

        if std::env::var("KAFKA_CONSUMER_AUTO_COMMIT").is_err() {
            std::env::set_var("KAFKA_CONSUMER_AUTO_COMMIT", auto_commit.to_string());
        }
    }
}
