pub mod client;
pub mod request;
pub mod response;

pub use client::{ApiClient, ApiClientBuilder};
pub use request::{HttpMethod, RequestInput};
pub use response::HttpResponse;
