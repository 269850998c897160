//! Game identity as advertised by the `gamename` server variable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Games listed on the master list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameName {
    /// FiveM. Servers that omit `gamename` belong here.
    #[default]
    Gta5,
    /// RedM.
    Rdr3,
    /// LibertyM.
    Ny,
    Launcher,
}

#[derive(Debug, Error)]
#[error("unknown game name: {0}")]
pub struct UnknownGame(pub String);

impl GameName {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameName::Gta5 => "gta5",
            GameName::Rdr3 => "rdr3",
            GameName::Ny => "ny",
            GameName::Launcher => "launcher",
        }
    }

    /// Whether a raw `gamename` variable denotes this game.
    ///
    /// An absent or empty variable means the primary game.
    pub fn matches(&self, raw: Option<&str>) -> bool {
        match raw {
            None | Some("") => *self == GameName::default(),
            Some(value) => value == self.as_str(),
        }
    }
}

impl FromStr for GameName {
    type Err = UnknownGame;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gta5" => Ok(GameName::Gta5),
            "rdr3" => Ok(GameName::Rdr3),
            "ny" => Ok(GameName::Ny),
            "launcher" => Ok(GameName::Launcher),
            other => Err(UnknownGame(other.to_string())),
        }
    }
}

impl fmt::Display for GameName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
