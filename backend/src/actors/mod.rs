pub mod database_actor;

pub use database_actor::{DatabaseActor, DatabaseHandle, DatabaseMsg};
