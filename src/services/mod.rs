pub mod dedup;
pub mod delivery;
pub mod delivery_scheduler;
pub mod gateway;
pub mod metrics;
pub mod phone;
pub mod retention;
pub mod scheduler;
pub mod sweep_lock;
pub mod templates;
pub mod whatsapp;
