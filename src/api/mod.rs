pub mod auth;
pub mod google_oauth;
pub mod health;
pub mod opportunity;
pub mod program;
pub mod proposal;
pub mod requests;
pub mod user;
pub mod vendor;
