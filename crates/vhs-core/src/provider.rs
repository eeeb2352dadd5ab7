use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Cloud storage providers
///
/// `Local` is a filesystem-backed provider used for development and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Google,
    Azure,
    Local,
}

impl CloudProvider {
    /// Resolve the provider from a raw `CLOUD_PROVIDER` value.
    ///
    /// An absent value selects AWS. Unknown values are logged and also fall back to AWS.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => CloudProvider::Aws,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Unknown CLOUD_PROVIDER value, defaulting to aws");
                CloudProvider::Aws
            }),
        }
    }
}

impl FromStr for CloudProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aws" | "s3" => Ok(CloudProvider::Aws),
            "google" | "gcs" | "gcp" => Ok(CloudProvider::Google),
            "azure" => Ok(CloudProvider::Azure),
            "local" => Ok(CloudProvider::Local),
            _ => Err(anyhow::anyhow!("Invalid cloud provider: {}", s)),
        }
    }
}

impl Display for CloudProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CloudProvider::Aws => write!(f, "aws"),
            CloudProvider::Google => write!(f, "google"),
            CloudProvider::Azure => write!(f, "azure"),
            CloudProvider::Local => write!(f, "local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("AWS".parse::<CloudProvider>().unwrap(), CloudProvider::Aws);
        assert_eq!("s3".parse::<CloudProvider>().unwrap(), CloudProvider::Aws);
        assert_eq!("GCS".parse::<CloudProvider>().unwrap(), CloudProvider::Google);
        assert_eq!("Azure".parse::<CloudProvider>().unwrap(), CloudProvider::Azure);
        assert_eq!("local".parse::<CloudProvider>().unwrap(), CloudProvider::Local);
        assert!("dropbox".parse::<CloudProvider>().is_err());
    }

    #[test]
    fn env_value_defaults_to_aws() {
        assert_eq!(CloudProvider::from_env_value(None), CloudProvider::Aws);
        assert_eq!(CloudProvider::from_env_value(Some("")), CloudProvider::Aws);
        assert_eq!(CloudProvider::from_env_value(Some("dropbox")), CloudProvider::Aws);
        assert_eq!(CloudProvider::from_env_value(Some("google")), CloudProvider::Google);
    }

    #[test]
    fn display_round_trips_through_serde_name() {
        let json = serde_json::to_string(&CloudProvider::Google).unwrap();
        assert_eq!(json, "\"google\"");
        assert_eq!(CloudProvider::Azure.to_string(), "azure");
    }
}
