pub mod admin;
pub mod auth;
pub mod health;
pub mod payments;
pub mod projects;
pub mod referrals;
pub mod users;
pub mod webhooks;
