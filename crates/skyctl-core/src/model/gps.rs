use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known vehicle position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp: DateTime<Utc>,
}
