pub mod fapshi;
pub mod reconciler;
pub mod registration;
pub mod repair;
