pub mod admin_stats;
pub mod coupon;
pub mod deployment;
pub mod payment;
pub mod project;
pub mod project_file;
pub mod referral;
pub mod user;
