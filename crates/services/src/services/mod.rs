pub mod account;
pub mod ai_client;
pub mod archive;
pub mod billing;
pub mod deployments;
pub mod paystack;
pub mod project_builder;
pub mod project_planner;
pub mod referral;
pub mod settlement;
pub mod usage;
pub mod vercel;
pub mod webhook;
