pub mod admin;
pub mod health;
pub mod registration;
pub mod webhooks;
