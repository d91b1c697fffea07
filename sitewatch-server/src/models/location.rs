use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LocationError;

/// A physical site with its own device. The set is closed: records for every
/// variant exist from startup and nothing else is ever accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Office,
    Home,
}

impl Location {
    pub const ALL: [Location; 2] = [Location::Office, Location::Home];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Office => "office",
            Location::Home => "home",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "office" => Ok(Location::Office),
            "home" => Ok(Location::Home),
            other => Err(LocationError::InvalidLocation(other.to_string())),
        }
    }
}
