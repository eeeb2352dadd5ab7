//! Configuration module
//!
//! Storage configuration is resolved from an [`EnvLayers`] lookup plus explicit overrides
//! (CLI flags). Credentials are wrapped in [`Secret`] and only their presence is logged.

use std::path::PathBuf;
use std::time::Duration;

use crate::encoding::{process_secret_key, unescape_env_value};
use crate::env::EnvLayers;
use crate::error::ConfigError;
use crate::provider::CloudProvider;
use crate::secret::Secret;

pub const DEFAULT_BUCKET: &str = "emprops-share";
pub const TEST_BUCKET_SUFFIX: &str = "-test";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

const VERIFY_MAX_ATTEMPTS: u32 = 5;
const VERIFY_DELAY_MS: u64 = 1000;
const MAX_CONCURRENT_UPLOADS: usize = 4;

/// How uploads are confirmed after the write completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            max_attempts: VERIFY_MAX_ATTEMPTS,
            delay: Duration::from_millis(VERIFY_DELAY_MS),
        }
    }
}

/// Provider-specific credentials
#[derive(Debug, Clone)]
pub enum ProviderCredentials {
    Aws {
        access_key_id: Secret,
        secret_access_key: Secret,
        region: String,
        // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
        endpoint: Option<String>,
    },
    Google {
        service_account_path: Option<PathBuf>,
    },
    Azure {
        account: String,
        access_key: Secret,
    },
    Local {
        root: PathBuf,
        base_url: String,
    },
}

/// Values that take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct StorageOverrides {
    pub provider: Option<CloudProvider>,
    pub bucket: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub provider: CloudProvider,
    pub bucket: String,
    pub test_mode: bool,
    pub credentials: ProviderCredentials,
    pub verify: VerifyPolicy,
    pub max_concurrent_uploads: usize,
}

impl StorageConfig {
    /// Resolve from the process environment and `.env` files
    pub fn from_env(overrides: StorageOverrides) -> Result<Self, ConfigError> {
        let env = EnvLayers::from_env_dirs()?;
        Self::resolve(&env, overrides)
    }

    pub fn resolve(env: &EnvLayers, overrides: StorageOverrides) -> Result<Self, ConfigError> {
        let provider = overrides
            .provider
            .unwrap_or_else(|| CloudProvider::from_env_value(env.get("CLOUD_PROVIDER")));

        let test_mode = env
            .get("STORAGE_TEST_MODE")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let bucket = resolve_bucket(env, provider, test_mode, overrides.bucket);

        tracing::debug!(
            provider = %provider,
            bucket = %bucket,
            test_mode,
            "Resolving cloud storage configuration"
        );

        let credentials = match provider {
            CloudProvider::Aws => resolve_aws(env)?,
            CloudProvider::Google => resolve_google(env),
            CloudProvider::Azure => resolve_azure(env)?,
            CloudProvider::Local => resolve_local(env)?,
        };

        let verify = VerifyPolicy {
            max_attempts: parse_or(env, "VERIFY_MAX_ATTEMPTS", VERIFY_MAX_ATTEMPTS).max(1),
            delay: Duration::from_millis(parse_or(env, "VERIFY_DELAY_MS", VERIFY_DELAY_MS)),
        };

        let max_concurrent_uploads =
            parse_or(env, "MAX_CONCURRENT_UPLOADS", MAX_CONCURRENT_UPLOADS).max(1);

        Ok(StorageConfig {
            provider,
            bucket,
            test_mode,
            credentials,
            verify,
            max_concurrent_uploads,
        })
    }
}

fn resolve_bucket(
    env: &EnvLayers,
    provider: CloudProvider,
    test_mode: bool,
    explicit: Option<String>,
) -> String {
    if let Some(bucket) = explicit.filter(|b| !b.trim().is_empty()) {
        return bucket;
    }

    let mut candidates: Vec<&str> = Vec::new();
    if provider == CloudProvider::Azure {
        candidates.push("CLOUD_STORAGE_TEST_CONTAINER");
    }
    candidates.push("CLOUD_STORAGE_CONTAINER");
    match provider {
        CloudProvider::Azure => candidates.push("AZURE_STORAGE_CONTAINER"),
        CloudProvider::Aws => candidates.push("S3_BUCKET_NAME"),
        _ => {}
    }

    for key in candidates {
        if let Some(value) = env.get(key) {
            tracing::debug!(
                variable = key,
                source = env.source_of(key).unwrap_or("unknown"),
                "Using bucket from environment"
            );
            return value.to_string();
        }
    }

    if test_mode {
        format!("{}{}", DEFAULT_BUCKET, TEST_BUCKET_SUFFIX)
    } else {
        DEFAULT_BUCKET.to_string()
    }
}

fn resolve_aws(env: &EnvLayers) -> Result<ProviderCredentials, ConfigError> {
    let access_key = env.get("AWS_ACCESS_KEY_ID").map(str::to_string);
    let secret_key = match env.first_of(&["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY_ENCODED"]) {
        Some(("AWS_SECRET_ACCESS_KEY_ENCODED", value)) => Some(process_secret_key(value)),
        Some((_, value)) => Some(value.to_string()),
        None => None,
    }
    .filter(|s| !s.is_empty());
    let region = env
        .get("AWS_DEFAULT_REGION")
        .or_else(|| env.get("AWS_REGION"))
        .unwrap_or(DEFAULT_AWS_REGION)
        .to_string();

    log_presence("AWS_ACCESS_KEY_ID", access_key.is_some());
    log_presence("AWS_SECRET_ACCESS_KEY", secret_key.is_some());

    match (access_key, secret_key) {
        (Some(access_key), Some(secret_key)) => Ok(ProviderCredentials::Aws {
            access_key_id: Secret::new(access_key),
            secret_access_key: Secret::new(secret_key),
            region,
            endpoint: env.get("S3_ENDPOINT").map(str::to_string),
        }),
        (access_key, secret_key) => {
            let mut missing = Vec::new();
            if access_key.is_none() {
                missing.push("AWS_ACCESS_KEY_ID".to_string());
            }
            if secret_key.is_none() {
                missing.push("AWS_SECRET_ACCESS_KEY".to_string());
            }
            Err(ConfigError::MissingVariables(missing))
        }
    }
}

fn resolve_google(env: &EnvLayers) -> ProviderCredentials {
    let service_account_path = env.get("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
    if service_account_path.is_none() {
        tracing::warn!(
            "GOOGLE_APPLICATION_CREDENTIALS not set, falling back to ambient credentials"
        );
    }
    ProviderCredentials::Google {
        service_account_path,
    }
}

fn resolve_azure(env: &EnvLayers) -> Result<ProviderCredentials, ConfigError> {
    let account = env.get("AZURE_STORAGE_ACCOUNT").map(str::to_string);
    let key = match env.first_of(&["AZURE_STORAGE_KEY", "AZURE_STORAGE_KEY_ENCODED"]) {
        Some(("AZURE_STORAGE_KEY_ENCODED", value)) => Some(unescape_env_value(value)),
        Some((_, value)) => Some(value.to_string()),
        None => None,
    }
    .filter(|k| !k.is_empty());

    log_presence("AZURE_STORAGE_ACCOUNT", account.is_some());
    log_presence("AZURE_STORAGE_KEY", key.is_some());

    match (account, key) {
        (Some(account), Some(key)) => Ok(ProviderCredentials::Azure {
            account,
            access_key: Secret::new(key),
        }),
        (account, key) => {
            let mut missing = Vec::new();
            if account.is_none() {
                missing.push("AZURE_STORAGE_ACCOUNT".to_string());
            }
            if key.is_none() {
                missing.push("AZURE_STORAGE_KEY".to_string());
            }
            Err(ConfigError::MissingVariables(missing))
        }
    }
}

fn resolve_local(env: &EnvLayers) -> Result<ProviderCredentials, ConfigError> {
    let root = env
        .get("LOCAL_STORAGE_PATH")
        .map(PathBuf::from)
        .ok_or_else(|| ConfigError::MissingVariables(vec!["LOCAL_STORAGE_PATH".to_string()]))?;

    let base_url = match env.get("LOCAL_STORAGE_BASE_URL") {
        Some(url) => url.to_string(),
        None => {
            let absolute = std::path::absolute(&root).unwrap_or_else(|_| root.clone());
            format!("file://{}", absolute.display())
        }
    };

    Ok(ProviderCredentials::Local { root, base_url })
}

fn log_presence(variable: &str, present: bool) {
    tracing::debug!(
        variable,
        status = if present { "present" } else { "missing" },
        "Credential variable"
    );
}

fn parse_or<T: std::str::FromStr>(env: &EnvLayers, key: &str, default: T) -> T {
    env.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
