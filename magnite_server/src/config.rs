use std::env;

use log::*;
use mgn_common::{parse_boolean_flag, Secret};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use stripe_tools::StripeConfig;

use crate::errors::ServerError;

const DEFAULT_MGN_HOST: &str = "127.0.0.1";
const DEFAULT_MGN_PORT: u16 = 8000;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/magnite_store.db";
/// Anything shorter than this is guessable enough to forge access tokens offline.
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Credentials and tuning for the payment processor, shared with the API client and the webhook
    /// signature middleware.
    pub stripe: StripeConfig,
    /// If false, webhook signature verification is skipped and any payload is accepted. Local development
    /// only. **DANGER**
    pub webhook_signature_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MGN_HOST.to_string(),
            port: DEFAULT_MGN_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            stripe: StripeConfig::default(),
            webhook_signature_checks: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MGN_HOST").ok().unwrap_or_else(|| DEFAULT_MGN_HOST.into());
        let port = env::var("MGN_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MGN_PORT. {e} Using the default, {DEFAULT_MGN_PORT}, instead."
                    );
                    DEFAULT_MGN_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MGN_PORT);
        let database_url = env::var("MGN_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MGN_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let stripe = StripeConfig::new_from_env_or_default();
        let webhook_signature_checks = parse_boolean_flag(env::var("MGN_WEBHOOK_SIGNATURE_CHECKS").ok(), true);
        if !webhook_signature_checks {
            warn!(
                "🚨️ Webhook signature checks are DISABLED. Anyone who can reach this server can mark orders as paid. \
                 Do not run production like this."
            );
        }
        Self { host, port, database_url, auth, stripe, webhook_signature_checks }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The shared secret used to sign and verify access tokens (HS256).
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT signing secret has not been set. I'm using a random value for this session, so every \
             issued token dies with the process. Set MGN_JWT_SECRET on anything resembling production. 🚨️🚨️🚨️"
        );
        let secret: String = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("MGN_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [MGN_JWT_SECRET]")))?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ServerError::ConfigurationError(format!(
                "MGN_JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long"
            )));
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}
