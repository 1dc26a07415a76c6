use std::env;
use std::fmt;

use aws_config::SdkConfig;
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;

pub const DEFAULT_ENDPOINT: &str = "https://insights-collector.newrelic.com";

/// Insert key for the metrics collector. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct InsertKey(String);

impl InsertKey {
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl From<String> for InsertKey {
    fn from(value: String) -> Self {
        InsertKey(value)
    }
}

impl fmt::Debug for InsertKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("InsertKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub account_id: String,
    pub api_key: InsertKey,
    pub endpoint: String,
    pub records_max_concurrency: usize,
}

fn required(name: &str) -> Result<String, String> {
    let value = env::var(name).map_err(|e| format!("{} not set - {}", name, e))?;
    if value.trim().is_empty() {
        return Err(format!("{} not set - empty value", name));
    }
    Ok(value)
}

impl Config {
    pub fn load_from_env() -> Result<Config, String> {
        let conf = Config {
            account_id: required("NR_ACCOUNT_ID")?,
            api_key: required("NR_API_KEY")?.into(),
            endpoint: env::var("NR_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            records_max_concurrency: env::var("RECORDS_MAX_CONCURRENCY")
                .unwrap_or("10".to_string())
                .parse::<usize>()
                .map_err(|e| format!("Error parsing RECORDS_MAX_CONCURRENCY to usize - {}", e))?
                .max(1),
        };

        Ok(conf)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum KeySourceError {
    #[error("Failed to access AWS Secrets Manager. Please make sure the lambda function has permissions to access the {secret_id} secret. Error: {error:?}")]
    FailedToAccessSecretsManager {
        secret_id: String,
        error: GetSecretValueError,
    },
    #[error("Didn't find the {secret_id} secret in AWS secretsmanager")]
    MissingSecret { secret_id: String },
}

pub async fn get_api_key_from_secrets_manager(
    aws_config: &SdkConfig,
    secret_id: String,
) -> Result<InsertKey, KeySourceError> {
    let secretsmanager = aws_sdk_secretsmanager::Client::new(aws_config);
    let response = secretsmanager
        .get_secret_value()
        .set_secret_id(Some(secret_id.clone()))
        .send()
        .await
        .map_err(|error| KeySourceError::FailedToAccessSecretsManager {
            secret_id: secret_id.clone(),
            error: error.into_service_error(),
        })?;
    let secret = response
        .secret_string
        .ok_or(KeySourceError::MissingSecret { secret_id })?;
    Ok(InsertKey::from(secret))
}
