//! Secret references in importer options.
//!
//! An option value may point at a secret kept outside the config file:
//!
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//! - anything else is taken literally

use eventsync_importers::ImporterOptions;

/// A parsed option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    Env(&'a str),
    Pass(&'a str),
    Literal(&'a str),
}

impl<'a> SecretRef<'a> {
    pub fn parse(value: &'a str) -> Self {
        if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else {
            Self::Literal(value)
        }
    }

    pub fn resolve(&self) -> Result<String, String> {
        match *self {
            Self::Env(var) => std::env::var(var)
                .map_err(|_| format!("environment variable `{}` is not set", var)),
            Self::Pass(path) => resolve_pass(path),
            Self::Literal(value) => Ok(value.to_string()),
        }
    }
}

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> Result<String, String> {
    SecretRef::parse(value).resolve()
}

/// Resolves every option value, naming the failing key on error.
pub fn resolve_options(options: &ImporterOptions) -> Result<ImporterOptions, String> {
    options
        .iter()
        .map(|(key, value)| {
            resolve(value)
                .map(|resolved| (key.clone(), resolved))
                .map_err(|e| format!("option `{}`: {}", key, e))
        })
        .collect()
}

fn resolve_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| format!("`pass show {}` produced no output", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefixes() {
        assert_eq!(SecretRef::parse("env::KEY"), SecretRef::Env("KEY"));
        assert_eq!(SecretRef::parse("pass::orgs/an"), SecretRef::Pass("orgs/an"));
        assert_eq!(SecretRef::parse("plain"), SecretRef::Literal("plain"));
        assert_eq!(SecretRef::parse("environment"), SecretRef::Literal("environment"));
        assert_eq!(SecretRef::parse(""), SecretRef::Literal(""));
    }

    #[test]
    fn env_reference_resolves() {
        unsafe {
            std::env::set_var("_EVENTSYNC_TEST_SECRET", "osdi-token");
        }
        assert_eq!(resolve("env::_EVENTSYNC_TEST_SECRET").unwrap(), "osdi-token");
        unsafe {
            std::env::remove_var("_EVENTSYNC_TEST_SECRET");
        }
    }

    #[test]
    fn missing_env_var_names_the_option() {
        let options = ImporterOptions::from([(
            "api_key".to_string(),
            "env::_EVENTSYNC_SURELY_UNSET_VAR".to_string(),
        )]);
        let err = resolve_options(&options).unwrap_err();
        assert!(err.starts_with("option `api_key`"));
        assert!(err.contains("not set"));
    }

    #[test]
    fn literals_pass_through() {
        let options = ImporterOptions::from([("uid_prefix".to_string(), "dbc".to_string())]);
        assert_eq!(resolve_options(&options).unwrap(), options);
    }

    #[test]
    fn pass_failure_is_an_error() {
        assert!(resolve("pass::eventsync/nonexistent/entry/31337").is_err());
    }
}
