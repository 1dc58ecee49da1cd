pub mod admin;
pub mod preflight;
pub mod wizard;
