use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Canonical bed lifecycle status. One closed enumeration used everywhere;
/// the lowercase form is both the storage and the wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BedStatus {
    Available,
    Held,
    Occupied,
}

impl BedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BedStatus::Available => "available",
            BedStatus::Held => "held",
            BedStatus::Occupied => "occupied",
        }
    }
}

impl fmt::Display for BedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BedStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(BedStatus::Available),
            "held" => Ok(BedStatus::Held),
            "occupied" => Ok(BedStatus::Occupied),
            other => Err(EngineError::internal(format!(
                "invalid bed status value: {other}"
            ))),
        }
    }
}

/// One physical bed as the dashboard sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Bed {
    pub bed_id: u16,
    pub status: BedStatus,
    pub guest_id: Option<String>,
}

/// Summary counts for the dashboard header. `total` is always the physical
/// capacity; the three status counts sum to it or the registry is corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BedCounts {
    pub available: u32,
    pub held: u32,
    pub occupied: u32,
    pub total: u32,
}
