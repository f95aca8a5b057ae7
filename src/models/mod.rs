//! Models Module
//!
//! Request and response descriptors exchanged with the outbound fetcher.

mod requests;
mod responses;

pub use requests::{ApiRequest, Method};
pub use responses::ApiResponse;
