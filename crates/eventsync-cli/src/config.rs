//! Application configuration.
//!
//! Settings live in one `config.toml`, by default at
//! `~/.config/eventsync/config.toml`. Organizations can also be defined
//! from the environment:
//!
//! ```text
//! CONFIG_ORGANIZATIONS_BIKE_DALLAS_URL=https://example.org/feed.ics
//! CONFIG_ORGANIZATIONS_BIKE_DALLAS_IMPORTER=ical
//! ```
//!
//! defines (or replaces the URL and importer of) the organization
//! "Bike Dallas". Both variables must be set for the entry to apply.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use eventsync_engine::OrganizationConfig;
use eventsync_importers::{ImporterOptions, ImporterRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{CliError, CliResult};
use crate::secret;

const ENV_PREFIX: &str = "CONFIG_ORGANIZATIONS_";
const ENV_URL_SUFFIX: &str = "_URL";
const ENV_IMPORTER_SUFFIX: &str = "_IMPORTER";

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file. Defaults to the user data directory.
    pub database: Option<PathBuf>,

    /// IANA zone for floating and date-only times.
    pub default_timezone: String,

    /// Organizations synced at once.
    pub max_concurrency: usize,

    pub fetch_timeout_secs: u64,

    /// Daemon interval between sync runs.
    pub interval_secs: u64,

    pub organizations: BTreeMap<String, OrganizationSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: None,
            default_timezone: eventsync_core::DEFAULT_TIMEZONE.name().to_string(),
            max_concurrency: eventsync_engine::DEFAULT_MAX_CONCURRENCY,
            fetch_timeout_secs: eventsync_importers::fetch::DEFAULT_FETCH_TIMEOUT.as_secs(),
            interval_secs: eventsync_engine::DEFAULT_SYNC_INTERVAL.as_secs(),
            organizations: BTreeMap::new(),
        }
    }
}

/// One `[organizations."Name"]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    #[serde(default)]
    pub url: String,

    pub importer: String,

    /// Importer options; values may be `env::` or `pass::` references.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: ImporterOptions,
}

impl AppConfig {
    /// Loads `path`, or the default path when `None`, then applies
    /// environment overrides.
    ///
    /// A missing file is an error only when `path` was given explicitly.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                    Self::default()
                }
            }
        };

        let applied = config.apply_env_overrides(std::env::vars());
        if !applied.is_empty() {
            info!(organizations = ?applied, "Applied organizations from the environment");
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("failed to parse config: {}", e))
    }

    pub fn to_toml(&self) -> CliResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Applies `CONFIG_ORGANIZATIONS_<KEY>_URL` / `_IMPORTER` pairs from
    /// `vars` and returns the organization names that were set.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut pending: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();

        for (key, value) in vars {
            let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let (raw_name, is_url) = if let Some(name) = rest.strip_suffix(ENV_URL_SUFFIX) {
                (name, true)
            } else if let Some(name) = rest.strip_suffix(ENV_IMPORTER_SUFFIX) {
                (name, false)
            } else {
                continue;
            };

            let name = title_case(&raw_name.replace('_', " "));
            if name.trim().is_empty() {
                continue;
            }
            let entry = pending.entry(name).or_default();
            if is_url {
                entry.0 = Some(value);
            } else {
                entry.1 = Some(value);
            }
        }

        let mut applied = Vec::new();
        for (name, entry) in pending {
            let (Some(url), Some(importer)) = entry else {
                debug!(organization = %name, "Ignoring incomplete environment organization");
                continue;
            };
            if url.is_empty() || importer.is_empty() {
                continue;
            }
            let settings = self.organizations.entry(name.clone()).or_default();
            settings.url = url;
            settings.importer = importer;
            applied.push(name);
        }
        applied
    }

    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventsync")
    }

    pub fn default_database_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventsync")
            .join("events.db")
    }

    /// The database path: `override_path`, then the config, then the default.
    pub fn database_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .unwrap_or_else(Self::default_database_path)
    }

    pub fn timezone(&self) -> CliResult<Tz> {
        eventsync_core::parse_timezone(&self.default_timezone).ok_or_else(|| {
            CliError::Config(format!("unknown timezone `{}`", self.default_timezone))
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Organizations to sync, with secrets resolved. `only` restricts the
    /// list to one organization.
    pub fn organizations(&self, only: Option<&str>) -> CliResult<Vec<OrganizationConfig>> {
        if let Some(name) = only
            && !self.organizations.contains_key(name)
        {
            return Err(CliError::Usage(format!("unknown organization `{}`", name)));
        }

        self.organizations
            .iter()
            .filter(|(name, _)| only.is_none_or(|only| only == name.as_str()))
            .map(|(name, settings)| {
                let options = secret::resolve_options(&settings.options)
                    .map_err(|e| CliError::Secret(format!("{}: {}", name, e)))?;
                Ok(OrganizationConfig {
                    name: name.clone(),
                    url: settings.url.clone(),
                    importer: settings.importer.clone(),
                    options,
                })
            })
            .collect()
    }

    /// Checks the configuration against the registered importers and
    /// returns every problem found.
    pub fn validate(&self, registry: &ImporterRegistry) -> Vec<String> {
        let mut problems = Vec::new();

        if eventsync_core::parse_timezone(&self.default_timezone).is_none() {
            problems.push(format!("unknown timezone `{}`", self.default_timezone));
        }
        if self.max_concurrency == 0 {
            problems.push("max_concurrency must be at least 1".to_string());
        }

        for (name, settings) in &self.organizations {
            if !registry.contains(&settings.importer) {
                problems.push(format!(
                    "{}: unknown importer `{}` (known: {})",
                    name,
                    settings.importer,
                    registry.names().join(", ")
                ));
            }
            if !settings.url.trim().is_empty()
                && let Err(e) = Url::parse(settings.url.trim())
            {
                problems.push(format!("{}: invalid url `{}`: {}", name, settings.url, e));
            }
            if let Err(e) = secret::resolve_options(&settings.options) {
                problems.push(format!("{}: {}", name, e));
            }
        }

        problems
    }
}

/// Upper-cases the first letter of each word and lower-cases the rest.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            word_start = true;
            out.push(c);
        } else if word_start {
            out.extend(c.to_uppercase());
            word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use eventsync_importers::StaticFetcher;

    fn registry() -> ImporterRegistry {
        ImporterRegistry::with_defaults(
            Arc::new(StaticFetcher::new()),
            eventsync_core::DEFAULT_TIMEZONE,
        )
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const SAMPLE: &str = r#"
database = "/var/lib/eventsync/events.db"
max_concurrency = 2

[organizations."Dallas Bicycle Coalition"]
url = "https://example.org/events.json"
importer = "custom_dallas_bicycle_coalition"

[organizations."Dallas Urbanists"]
importer = "action_network_api"
options = { api_key = "env::_EVENTSYNC_CONFIG_TEST_KEY" }
"#;

    #[test]
    fn parses_with_defaults() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.default_timezone, "America/Chicago");
        assert_eq!(config.interval(), Duration::from_secs(3600));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.organizations.len(), 2);
        let urbanists = &config.organizations["Dallas Urbanists"];
        assert_eq!(urbanists.url, "");
        assert_eq!(urbanists.options["api_key"], "env::_EVENTSYNC_CONFIG_TEST_KEY");
    }

    #[test]
    fn empty_file_is_the_default() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = AppConfig::from_toml("[organizations.x]\nurl = 3").unwrap_err();
        assert!(err.contains("failed to parse config"));
    }

    #[test]
    fn load_from_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load_from(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(
            config.database_path(None),
            PathBuf::from("/var/lib/eventsync/events.db")
        );
        assert_eq!(
            config.database_path(Some(Path::new("/tmp/other.db"))),
            PathBuf::from("/tmp/other.db")
        );
    }

    #[test]
    fn env_overrides_define_and_replace_organizations() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        let applied = config.apply_env_overrides(vars(&[
            ("CONFIG_ORGANIZATIONS_BIKE_DALLAS_URL", "https://bike.example/feed.ics"),
            ("CONFIG_ORGANIZATIONS_BIKE_DALLAS_IMPORTER", "ical"),
            ("CONFIG_ORGANIZATIONS_DALLAS_URBANISTS_URL", "https://an.example/api"),
            ("CONFIG_ORGANIZATIONS_DALLAS_URBANISTS_IMPORTER", "action_network_api"),
            ("CONFIG_ORGANIZATIONS_HALF_DONE_URL", "https://half.example"),
            ("CONFIG_ORGANIZATIONS_BIKE_DALLAS_TOKEN", "ignored"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(applied, ["Bike Dallas", "Dallas Urbanists"]);
        assert_eq!(config.organizations["Bike Dallas"].importer, "ical");
        let urbanists = &config.organizations["Dallas Urbanists"];
        assert_eq!(urbanists.url, "https://an.example/api");
        assert!(urbanists.options.contains_key("api_key"));
        assert!(!config.organizations.contains_key("Half Done"));
    }

    #[test]
    fn title_cases_env_keys() {
        assert_eq!(title_case("BIKE DALLAS"), "Bike Dallas");
        assert_eq!(title_case("dallas  URBANISTS"), "Dallas  Urbanists");
        assert_eq!(title_case("D MAGAZINE"), "D Magazine");
    }

    #[test]
    fn organizations_resolve_secrets() {
        unsafe {
            std::env::set_var("_EVENTSYNC_CONFIG_TEST_KEY", "resolved-token");
        }
        let config = AppConfig::from_toml(SAMPLE).unwrap();

        let all = config.organizations(None).unwrap();
        assert_eq!(all.len(), 2);
        let one = config.organizations(Some("Dallas Urbanists")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].options["api_key"], "resolved-token");
        assert!(matches!(
            config.organizations(Some("Nobody")),
            Err(CliError::Usage(_))
        ));

        unsafe {
            std::env::remove_var("_EVENTSYNC_CONFIG_TEST_KEY");
        }
    }

    #[test]
    fn validate_reports_every_problem() {
        let config = AppConfig::from_toml(
            r#"
default_timezone = "Mars/Olympus_Mons"

[organizations.Bad]
url = "not a url"
importer = "rss"

[organizations.Good]
url = "https://example.org/feed.ics"
importer = "ical"
"#,
        )
        .unwrap();

        let problems = config.validate(&registry());
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems[0].contains("Mars/Olympus_Mons"));
        assert!(problems[1].starts_with("Bad: unknown importer `rss`"));
        assert!(problems[2].starts_with("Bad: invalid url"));
    }

    #[test]
    fn dump_round_trips() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let dumped = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&dumped).unwrap(), config);
    }
}
