//! Postal address columns, meant to be embedded in a record with
//! `#[serde(flatten)]`.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CITY: &str = "St. Louis";
pub const DEFAULT_STATE: &str = "MO";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_state")]
    pub state: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
}

fn default_city() -> String {
    DEFAULT_CITY.to_string()
}

fn default_state() -> Option<String> {
    Some(DEFAULT_STATE.to_string())
}

impl Default for Address {
    fn default() -> Self {
        Self {
            street: String::new(),
            city: default_city(),
            state: default_state(),
            zipcode: None,
        }
    }
}

impl Address {
    pub fn new(street: impl Into<String>) -> Self {
        Self {
            street: street.into(),
            ..Self::default()
        }
    }

    /// One line rendering: `"{street} {city}, {state}  {zipcode}"`
    pub fn address(&self) -> String {
        format!(
            "{} {}, {}  {}",
            self.street,
            self.city,
            self.state.as_deref().unwrap_or(""),
            self.zipcode.as_deref().unwrap_or("")
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}
