//! Environment lookup helpers shared by the config sections.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Read an environment variable, treating unset and empty as `None`.
///
/// Non-unicode values are reported instead of silently ignored.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid unicode".to_string(),
        }),
    }
}

/// Parse an optional environment variable, falling back to `default`.
pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| s.trim().parse::<T>())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
        .map(|v| v.unwrap_or(default))
}

pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    optional_env(key)?
        .map(|s| s.trim().parse::<bool>())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be 'true' or 'false': {e}"),
        })
        .map(|v| v.unwrap_or(default))
}

/// Seconds-valued setting as a `Duration`.
pub(crate) fn parse_secs_env(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    parse_optional_env(key, default.as_secs()).map(Duration::from_secs)
}

/// Like [`parse_secs_env`], but zero is rejected.
pub(crate) fn parse_nonzero_secs_env(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let value = parse_secs_env(key, default)?;
    if value.is_zero() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be at least 1 second".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keys are unique per test so parallel test threads never race on them.

    #[test]
    fn test_missing_env_uses_default() {
        let value: u32 = parse_optional_env("BREWCTL_TEST_HELPERS_UNSET", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        // SAFETY: the key is private to this test.
        unsafe { std::env::set_var("BREWCTL_TEST_HELPERS_BAD_NUM", "seven") };
        let err = parse_optional_env::<u32>("BREWCTL_TEST_HELPERS_BAD_NUM", 7).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BREWCTL_TEST_HELPERS_BAD_NUM"));
    }

    #[test]
    fn test_bool_env() {
        // SAFETY: the key is private to this test.
        unsafe { std::env::set_var("BREWCTL_TEST_HELPERS_BOOL", "false") };
        assert!(!parse_bool_env("BREWCTL_TEST_HELPERS_BOOL", true).unwrap());
    }

    #[test]
    fn test_empty_is_unset() {
        // SAFETY: the key is private to this test.
        unsafe { std::env::set_var("BREWCTL_TEST_HELPERS_EMPTY", "  ") };
        assert_eq!(optional_env("BREWCTL_TEST_HELPERS_EMPTY").unwrap(), None);
    }

    #[test]
    fn test_zero_seconds_rejected() {
        // SAFETY: the key is private to this test.
        unsafe { std::env::set_var("BREWCTL_TEST_HELPERS_ZERO_SECS", "0") };
        let err = parse_nonzero_secs_env("BREWCTL_TEST_HELPERS_ZERO_SECS", Duration::from_secs(30))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BREWCTL_TEST_HELPERS_ZERO_SECS"));
        // Plain seconds parsing still accepts it.
        assert!(parse_secs_env("BREWCTL_TEST_HELPERS_ZERO_SECS", Duration::from_secs(30))
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_nonzero_seconds_accepted() {
        // SAFETY: the key is private to this test.
        unsafe { std::env::set_var("BREWCTL_TEST_HELPERS_POLL_SECS", "2") };
        let value =
            parse_nonzero_secs_env("BREWCTL_TEST_HELPERS_POLL_SECS", Duration::from_secs(30)).unwrap();
        assert_eq!(value, Duration::from_secs(2));
        let value =
            parse_nonzero_secs_env("BREWCTL_TEST_HELPERS_POLL_UNSET", Duration::from_secs(30)).unwrap();
        assert_eq!(value, Duration::from_secs(30));
    }
}
