//! Dimension kinds
//!
//! Portal transitions are defined between dimension kinds (overworld, nether,
//! end analogues). Worlds created by plugins that fit none of them are `Custom`.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Overworld,
    Nether,
    End,
    Custom,
}

impl DimensionKind {
    /// Canonical string key used in configs/logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overworld => "overworld",
            Self::Nether => "nether",
            Self::End => "end",
            Self::Custom => "custom",
        }
    }
}

impl Default for DimensionKind {
    fn default() -> Self {
        Self::Overworld
    }
}

impl std::fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DimensionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overworld" | "normal" => Ok(Self::Overworld),
            "nether" => Ok(Self::Nether),
            "end" | "the_end" => Ok(Self::End),
            "custom" => Ok(Self::Custom),
            _ => Err(DomainError::parse(format!("Invalid dimension kind: {}", s))),
        }
    }
}
