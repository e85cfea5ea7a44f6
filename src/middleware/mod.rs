pub mod auth;
pub mod cron;
pub mod rate_limit;
pub mod tenant;
