//! Endpoint configuration for the CIS fiscalization service.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Production endpoint of the fiscalization service.
pub const PRODUCTION_URL: &str = "https://cis.porezna-uprava.hr:8449/FiskalizacijaService";

/// Demo (test) endpoint of the fiscalization service.
pub const DEMO_URL: &str = "https://cistest.apis-it.hr:8449/FiskalizacijaServiceTest";

/// Timeout applied to every request sent to the CIS service.
pub const CIS_TIMEOUT: Duration = Duration::from_secs(10);

/// Target CIS environment.
///
/// The demo environment accepts the freely issued demo certificates and is
/// meant for integration testing; production requires a production
/// application certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Demo,
    Production,
}

impl Environment {
    /// The service URL for this environment.
    pub fn endpoint_url(&self) -> &'static str {
        match self {
            Environment::Demo => DEMO_URL,
            Environment::Production => PRODUCTION_URL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Demo => "demo",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an [`Environment`] from a string fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown environment '{0}', expected 'demo' or 'production'")]
pub struct EnvironmentParseError(String);

impl FromStr for Environment {
    type Err = EnvironmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "demo" | "test" => Ok(Environment::Demo),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(EnvironmentParseError(other.to_string())),
        }
    }
}
