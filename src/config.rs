//! dbt Cloud credentials loaded from `dbt-cloud.toml` and the environment.
//!
//! Every value can come from the file; the `DBT_*` environment variables take
//! precedence when they are set and non-empty. Validation happens when a
//! [`DbtCloudClient`](crate::cloud::DbtCloudClient) is built from the config.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cloud::CloudError;

/// File read by [`DbtCloudConfig::load`] when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "dbt-cloud.toml";

/// Root of the v2 accounts API; the account id is appended to it.
pub const DEFAULT_API_ROOT: &str = "https://cloud.getdbt.com/api/v2/accounts";

/// Environment variable for each field, in validation order.
const ENV_VARS: [(&str, Field); 4] = [
    ("DBT_ACCESS_TOKEN", Field::AccessToken),
    ("DBT_ENVIRONMENT_ID", Field::EnvironmentId),
    ("DBT_ACCOUNT_ID", Field::AccountId),
    ("DBT_PROJECT_ID", Field::ProjectId),
];

#[derive(Debug, Clone, Copy)]
enum Field {
    AccessToken,
    EnvironmentId,
    AccountId,
    ProjectId,
}

/// Connection settings for one dbt Cloud account and project.
#[derive(Debug, Clone, Deserialize)]
pub struct DbtCloudConfig {
    /// Service or personal token sent as `Authorization: Token <token>`.
    #[serde(default)]
    pub access_token: String,

    #[serde(default)]
    pub environment_id: String,

    #[serde(default)]
    pub account_id: String,

    #[serde(default)]
    pub project_id: String,

    /// API root without the account segment.
    #[serde(default = "default_api_root")]
    pub api_root: String,
}

fn default_api_root() -> String {
    DEFAULT_API_ROOT.to_string()
}

impl Default for DbtCloudConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            environment_id: String::new(),
            account_id: String::new(),
            project_id: String::new(),
            api_root: default_api_root(),
        }
    }
}

impl DbtCloudConfig {
    /// Build a config from explicit values, using the public API root.
    pub fn new(
        access_token: impl Into<String>,
        environment_id: impl Into<String>,
        account_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            environment_id: environment_id.into(),
            account_id: account_id.into(),
            project_id: project_id.into(),
            api_root: default_api_root(),
        }
    }

    /// Load `path` (or `dbt-cloud.toml`) if it exists, then apply the
    /// process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<DbtCloudConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
    }

    /// Replace fields with non-empty values returned by `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for (name, field) in ENV_VARS {
            if let Some(value) = lookup(name)
                && !value.is_empty()
            {
                *self.field_mut(field) = value;
            }
        }
        self
    }

    /// Fail with the first required field that is empty.
    pub fn validate(&self) -> Result<(), CloudError> {
        let required = [
            ("access_token", &self.access_token),
            ("environment_id", &self.environment_id),
            ("account_id", &self.account_id),
            ("project_id", &self.project_id),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(CloudError::Config { field: *field }),
            None => Ok(()),
        }
    }

    /// Account-scoped base URL every request path is appended to.
    pub fn base_url(&self) -> String {
        format!("{}/{}", self.api_root.trim_end_matches('/'), self.account_id)
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::AccessToken => &mut self.access_token,
            Field::EnvironmentId => &mut self.environment_id,
            Field::AccountId => &mut self.account_id,
            Field::ProjectId => &mut self.project_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn complete() -> DbtCloudConfig {
        DbtCloudConfig::new("token", "2201", "1128", "3307")
    }

    #[test]
    fn default_config_values() {
        let config = DbtCloudConfig::default();
        assert!(config.access_token.is_empty());
        assert_eq!(config.api_root, DEFAULT_API_ROOT);
    }

    #[test]
    fn base_url_includes_account() {
        assert_eq!(
            complete().base_url(),
            "https://cloud.getdbt.com/api/v2/accounts/1128"
        );
    }

    #[test]
    fn base_url_tolerates_trailing_slash() {
        let mut config = complete();
        config.api_root = "http://127.0.0.1:9000/api/v2/accounts/".into();
        assert_eq!(config.base_url(), "http://127.0.0.1:9000/api/v2/accounts/1128");
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn validate_names_first_missing_field() {
        let mut config = complete();
        config.account_id = String::new();
        config.project_id = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CloudError::Config { field: "account_id" }));

        let err = DbtCloudConfig::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "access_token can't be None or Empty String");
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            access_token = "abc"
            account_id = "42"
        "#;
        let config: DbtCloudConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.access_token, "abc");
        assert_eq!(config.account_id, "42");
        assert!(config.project_id.is_empty());
        assert_eq!(config.api_root, DEFAULT_API_ROOT);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DBT_ACCESS_TOKEN", "from-env"),
            ("DBT_PROJECT_ID", ""),
        ]);
        let config = complete().with_env_overrides(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.access_token, "from-env");
        // Empty variables do not clobber the file.
        assert_eq!(config.project_id, "3307");
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "access_token = \"t\"\nenvironment_id = \"1\"\naccount_id = \"2\"\nproject_id = \"3\""
        )
        .unwrap();

        let config = DbtCloudConfig::load(Some(file.path())).unwrap();
        assert!(!config.access_token.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "access_token = [").unwrap();
        assert!(DbtCloudConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let config = DbtCloudConfig::load(Some(&missing)).unwrap();
        assert_eq!(config.api_root, DEFAULT_API_ROOT);
    }
}
