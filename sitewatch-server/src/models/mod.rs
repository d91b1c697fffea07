mod field;
mod location;
mod reading;

pub use field::{Field, FieldKind, FieldValue};
pub use location::Location;
pub use reading::{HistoryPoint, LocationView, Snapshot, Timestamp};
