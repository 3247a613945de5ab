//! Runtime environment detection.
//!
//! Reads `INBOX_ENV` to decide whether the process runs in production,
//! development or test mode. Test mode keeps configuration inside the
//! repository's `tmp/` directory instead of the user's config directory.
//!
//! Set `INBOX_ENV` to one of:
//! - `test` - Test mode
//! - `development` or `dev` - Development mode
//! - (anything else or unset) - Production mode

/// Runtime environment for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment (default).
    Production,
    /// Development environment.
    Development,
    /// Test environment.
    Test,
}

impl Environment {
    /// Detect current environment from `INBOX_ENV`.
    #[must_use]
    pub fn current() -> Self {
        Self::from_value(std::env::var("INBOX_ENV").ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        match value {
            Some("test") => Self::Test,
            Some("development" | "dev") => Self::Development,
            _ => Self::Production,
        }
    }

    /// Returns `true` if this is the test environment.
    #[must_use]
    pub fn is_test(self) -> bool {
        self == Self::Test
    }

    /// Returns `true` if this is the production environment.
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Development => write!(f, "development"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Convenience check for `INBOX_ENV=test`.
#[must_use]
pub fn is_test_mode() -> bool {
    Environment::current().is_test()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Production.to_string(), "production");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Test.to_string(), "test");
    }

    #[test]
    fn test_environment_from_value() {
        assert_eq!(Environment::from_value(Some("test")), Environment::Test);
        assert_eq!(Environment::from_value(Some("dev")), Environment::Development);
        assert_eq!(
            Environment::from_value(Some("development")),
            Environment::Development
        );
        assert_eq!(Environment::from_value(Some("staging")), Environment::Production);
        assert_eq!(Environment::from_value(None), Environment::Production);
    }

    #[test]
    fn test_environment_is_methods() {
        assert!(Environment::Test.is_test());
        assert!(!Environment::Test.is_production());
        assert!(Environment::Production.is_production());
        assert!(!Environment::Development.is_test());
    }
}
