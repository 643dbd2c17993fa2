use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Merchant region the gateway account is registered in.
/// Determines which processor endpoint the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Region {
    Sau,
}

impl Region {
    pub fn base_url(&self) -> &'static str {
        match self {
            Region::Sau => "https://secure.clickpay.com.sa",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "SAU" => Ok(Region::Sau),
            other => Err(anyhow!("unsupported region '{}', expected SAU", other)),
        }
    }
}

/// Whether the hosted page settles immediately or places a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PayPageMode {
    Sale,
    Auth,
}

impl PayPageMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sale" => Ok(PayPageMode::Sale),
            "auth" => Ok(PayPageMode::Auth),
            other => Err(anyhow!(
                "invalid pay page mode '{}', expected 'sale' or 'auth'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub profile_id: u64,
    pub server_key: String,
    pub region: Region,
    pub pay_page_mode: PayPageMode,
    pub hide_shipping_address: bool,
    /// Order workflow status applied after a successful synchronous return
    pub complete_order_status: String,
    /// Public base URL the notification endpoint is reachable at
    pub callback_base_url: String,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        };

        let gateway = GatewayConfig {
            profile_id: env::var("CLICKPAY_PROFILE_ID")
                .context("CLICKPAY_PROFILE_ID not set")?
                .parse()
                .context("CLICKPAY_PROFILE_ID must be a valid number")?,
            server_key: env::var("CLICKPAY_SERVER_KEY").context("CLICKPAY_SERVER_KEY not set")?,
            region: Region::parse(
                &env::var("CLICKPAY_REGION").unwrap_or_else(|_| "SAU".to_string()),
            )?,
            pay_page_mode: PayPageMode::parse(
                &env::var("CLICKPAY_PAY_PAGE_MODE").unwrap_or_else(|_| "sale".to_string()),
            )?,
            hide_shipping_address: env::var("CLICKPAY_HIDE_SHIPPING")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            complete_order_status: env::var("CLICKPAY_COMPLETE_ORDER_STATUS")
                .unwrap_or_else(|_| "completed".to_string()),
            callback_base_url: env::var("CLICKPAY_CALLBACK_BASE_URL")
                .context("CLICKPAY_CALLBACK_BASE_URL not set")?,
            request_timeout_secs: env::var("CLICKPAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("CLICKPAY_TIMEOUT_SECS must be a valid number")?,
        };

        let config = Config {
            server,
            database,
            gateway,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate port range
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        self.gateway.validate()
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server_key.trim().is_empty() {
            return Err(anyhow!("CLICKPAY_SERVER_KEY cannot be empty"));
        }

        if self.profile_id == 0 {
            return Err(anyhow!("CLICKPAY_PROFILE_ID must be greater than 0"));
        }

        if self.callback_base_url.trim().is_empty() {
            return Err(anyhow!("CLICKPAY_CALLBACK_BASE_URL cannot be empty"));
        }

        if !self.callback_base_url.starts_with("http") {
            return Err(anyhow!(
                "CLICKPAY_CALLBACK_BASE_URL must be an absolute URL, got {}",
                self.callback_base_url
            ));
        }

        let valid_statuses = ["completed", "fulfillment", "validation"];
        if !valid_statuses.contains(&self.complete_order_status.as_str()) {
            return Err(anyhow!(
                "Complete order status must be one of: {:?}, got {}",
                valid_statuses,
                self.complete_order_status
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow!("CLICKPAY_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }
}
