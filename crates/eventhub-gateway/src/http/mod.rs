pub mod error;
pub mod events;
pub mod health;
pub mod notifications;
pub mod registrations;
pub mod teams;
