#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A request or payload violates the service-declared bounds.
    #[error("Validation failed: {0}")]
    Validation(String),
}
