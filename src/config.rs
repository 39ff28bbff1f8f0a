use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub agcod: AgcodConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public origin used when building email validation URLs,
    /// e.g. "https://www.voterbowl.org".
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Credentials and endpoint for the AGCOD (Amazon Gift Codes On Demand) API.
///
/// All fields are required; `AgcodClient::from_config` rejects a config with
/// any empty field at construction time rather than failing on the first
/// vendor call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgcodConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint_host: String,
    pub partner_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmailConfig {
    pub api_key: String,
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    /// Provider-side template for the "validate your email" message.
    pub validation_template_id: String,
    /// Provider-side template for the "here is your gift card" message.
    pub gift_card_template_id: String,
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Read the config file if present; otherwise build entirely from
        // environment variables.
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("Failed to parse config: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // Without a config file, the database URL must come from the
                // environment.
                let database_url = get_env("DATABASE_URL")
                    .ok_or("Missing DATABASE_URL environment variable and no config.toml found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                        public_base_url: get_env("PUBLIC_BASE_URL")
                            .unwrap_or_else(|| "http://localhost:8080".to_string()),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    agcod: AgcodConfig {
                        access_key_id: get_env("AWS_ACCESS_KEY_ID").unwrap_or_default(),
                        secret_access_key: get_env("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
                        region: get_env("AWS_REGION").unwrap_or_default(),
                        endpoint_host: get_env("AGCOD_ENDPOINT_HOST").unwrap_or_default(),
                        partner_id: get_env("AGCOD_PARTNER_ID").unwrap_or_default(),
                    },
                    email: EmailConfig {
                        api_key: get_env("SENDGRID_API_KEY").unwrap_or_default(),
                        from_email: get_env("EMAIL_FROM_ADDRESS").unwrap_or_default(),
                        from_name: get_env("EMAIL_FROM_NAME")
                            .unwrap_or_else(|| "Voter Bowl".to_string()),
                        validation_template_id: get_env("EMAIL_VALIDATION_TEMPLATE_ID")
                            .unwrap_or_default(),
                        gift_card_template_id: get_env("EMAIL_GIFT_CARD_TEMPLATE_ID")
                            .unwrap_or_default(),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // Environment overrides apply even when the file exists.
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("PUBLIC_BASE_URL") {
            config.server.public_base_url = v;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("AWS_ACCESS_KEY_ID") {
            config.agcod.access_key_id = v;
        }
        if let Ok(v) = env::var("AWS_SECRET_ACCESS_KEY") {
            config.agcod.secret_access_key = v;
        }
        if let Ok(v) = env::var("AWS_REGION") {
            config.agcod.region = v;
        }
        if let Ok(v) = env::var("AGCOD_ENDPOINT_HOST") {
            config.agcod.endpoint_host = v;
        }
        if let Ok(v) = env::var("AGCOD_PARTNER_ID") {
            config.agcod.partner_id = v;
        }
        if let Ok(v) = env::var("SENDGRID_API_KEY") {
            config.email.api_key = v;
        }
        if let Ok(v) = env::var("EMAIL_FROM_ADDRESS") {
            config.email.from_email = v;
        }
        if let Ok(v) = env::var("EMAIL_FROM_NAME") {
            config.email.from_name = v;
        }
        if let Ok(v) = env::var("EMAIL_VALIDATION_TEMPLATE_ID") {
            config.email.validation_template_id = v;
        }
        if let Ok(v) = env::var("EMAIL_GIFT_CARD_TEMPLATE_ID") {
            config.email.gift_card_template_id = v;
        }

        Ok(config)
    }
}
