//! Consumer configuration.

use clap::Parser;

/// Path on which pushed change records are received.
pub const RECEIVER_PATH: &str = "/consumer/messagereceiver";

/// Delivery timeout (s) requested for the consumer's subscription.
pub const DEFAULT_SUBSCRIPTION_TIMEOUT: u32 = 900;

/// rowcast demo consumer command line arguments.
#[derive(Debug, Parser)]
#[command(name = "rowcast-consumer")]
#[command(about = "Demo subscriber printing rowcast change records")]
#[command(version)]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "0.0.0.0:8090")]
    pub listen: String,

    /// Base URL of the rowcast service.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub service_url: String,

    /// Base URL under which the service can reach this consumer.
    #[arg(long, default_value = "http://127.0.0.1:8090")]
    pub public_url: String,

    /// Delivery timeout (s) requested when subscribing.
    #[arg(long, default_value_t = DEFAULT_SUBSCRIPTION_TIMEOUT)]
    pub timeout: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Consumer configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Base URL of the rowcast service.
    pub service_url: String,
    /// Base URL under which the service can reach this consumer.
    pub public_url: String,
    /// Delivery timeout requested when subscribing.
    pub subscription_timeout: u32,
}

impl ConsumerConfig {
    /// URL registered as the subscription callback.
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.public_url.trim_end_matches('/'), RECEIVER_PATH)
    }

    /// Set the service base URL.
    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }
}

impl From<&Args> for ConsumerConfig {
    fn from(args: &Args) -> Self {
        Self {
            listen_addr: args.listen.clone(),
            service_url: args.service_url.clone(),
            public_url: args.public_url.clone(),
            subscription_timeout: args.timeout,
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8090".to_string(),
            service_url: "http://127.0.0.1:8080".to_string(),
            public_url: "http://127.0.0.1:8090".to_string(),
            subscription_timeout: DEFAULT_SUBSCRIPTION_TIMEOUT,
        }
    }
}
