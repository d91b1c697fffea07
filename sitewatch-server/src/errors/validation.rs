use crate::models::Field;

/// A payload that does not fit its field's type. Recovered locally: the field
/// keeps its previous value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid value {value:?} for {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub value: String,
    pub reason: &'static str,
}
