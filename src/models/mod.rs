pub mod appointment;
pub mod auth;
pub mod gateway;
pub mod notification;
pub mod template;
pub mod user;
