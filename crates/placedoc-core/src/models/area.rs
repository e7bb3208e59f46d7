use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// One of the three logical storage partitions a file can live in.
///
/// A file is owned by exactly one area at any consistent observation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Pending,
    Archive,
    Reject,
}

impl Area {
    pub const ALL: [Area; 3] = [Area::Pending, Area::Archive, Area::Reject];

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Pending => "pending",
            Area::Archive => "archive",
            Area::Reject => "reject",
        }
    }
}

impl FromStr for Area {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Area::Pending),
            "archive" => Ok(Area::Archive),
            "reject" => Ok(Area::Reject),
            _ => Err(anyhow::anyhow!("Invalid area: {}", s)),
        }
    }
}

impl Display for Area {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
