//! Walkthrough configuration.
//!
//! Every field has a default, so an empty file (or no file at all) replays
//! the stock walkthrough: three tippers sending 1 SOL each from wallets
//! holding 10 000 SOL.

use serde::Deserialize;
use std::{fs, io, path::Path, path::PathBuf};

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A scripted walkthrough.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Clock value before the first call commits
    pub genesis_timestamp: i64,
    /// Lamports every actor starts with
    pub starting_balance: u64,
    /// Lamports sent by a tip that names no amount
    pub tip_amount: u64,
    /// Tips in the order they are submitted, one fresh tipper each
    pub tips: Vec<TipScript>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TipScript {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub amount: Option<u64>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            genesis_timestamp: 1_700_000_000,
            starting_balance: 10_000 * LAMPORTS_PER_SOL,
            tip_amount: LAMPORTS_PER_SOL,
            tips: vec![
                TipScript::new("Ric", "Great Content, keep going"),
                TipScript::new("Leslie", "Love this content"),
                TipScript::new("Fran", "such cool, much nice"),
            ],
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Lamports the given scripted tip sends.
    pub fn amount_of(&self, tip: &TipScript) -> u64 {
        tip.amount.unwrap_or(self.tip_amount)
    }
}

impl TipScript {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            amount: None,
        }
    }
}
