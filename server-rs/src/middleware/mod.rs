pub mod admin;
pub mod rate_limit;

pub use admin::*;
pub use rate_limit::*;
