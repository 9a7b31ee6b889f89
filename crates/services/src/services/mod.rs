pub mod access;
pub mod applications;
pub mod attachments;
pub mod calendar;
pub mod commission_rates;
pub mod config;
pub mod dashboard;
pub mod extract;
pub mod profiles;
pub mod roles;
pub mod session;
pub mod storage;
