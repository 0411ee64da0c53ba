pub mod auth;
pub mod guards;

pub use guards::AuthedUser;
