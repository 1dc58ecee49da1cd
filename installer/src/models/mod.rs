pub mod config;
pub mod draft;
pub mod requests;
pub mod responses;
pub mod state;
