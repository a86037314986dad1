pub mod payment;
pub mod team;
pub mod volunteer;

pub use payment::*;
pub use team::*;
pub use volunteer::*;
