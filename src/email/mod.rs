pub mod common;
pub mod normalizer;

// Re-export commonly used items
pub use common::{CanonicalEmail, RawBody, RawHeader, RawMessage, RawPart};
pub use normalizer::{MessageNormalizer, NormalizeError};
