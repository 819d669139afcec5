mod api;
mod retry;

pub use api::{ApiClient, ApiResponse, ApiStatus, Paginated};
pub use retry::{retry_with_timeout, RetryConfig};
