use schemagate_schema::DialectConfig;
use schemagate_subject::DEFAULT_API_PREFIX;

/// Default queue group shared by gateway instances.
pub const DEFAULT_QUEUE_GROUP: &str = "schema_registry";

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Prefix of the API address space (`$SCHEMA`).
    pub api_prefix: String,
    /// Queue group used for API subscriptions, so that several gateways
    /// split the traffic instead of each handling every request.
    pub queue_group: String,
    /// Dialect options.
    pub dialects: DialectConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            queue_group: DEFAULT_QUEUE_GROUP.to_string(),
            dialects: DialectConfig::default(),
        }
    }
}
