use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use crate::models::{Field, FieldValue, Location};

/// Wall-clock instant rendered as RFC 3339 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] pub OffsetDateTime);

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Timestamp(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: Timestamp,
    pub temperature: f64,
    pub humidity: f64,
}

/// Detached copy of one location's state.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationView {
    pub location: Location,
    pub fields: BTreeMap<Field, FieldValue>,
    /// Oldest first.
    pub history: Vec<HistoryPoint>,
    pub connected: bool,
    pub last_seen: Option<Timestamp>,
}

impl LocationView {
    pub fn field(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub locations: BTreeMap<Location, LocationView>,
    pub bus_connected: bool,
}
