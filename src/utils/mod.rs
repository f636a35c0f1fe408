pub mod api_response;
pub mod clock;
pub mod error;
pub mod extract;
pub mod pagination;
