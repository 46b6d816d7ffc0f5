use thiserror::Error;

/// Validation errors shared by Vigil crates.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid subnet {value}: {reason}")]
    InvalidSubnet { value: String, reason: String },
}
