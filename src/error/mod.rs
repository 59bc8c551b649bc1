mod mirror;

pub use mirror::{ApiErrorBody, ApiErrorObject, MirrorError};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
