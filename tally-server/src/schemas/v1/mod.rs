pub mod profile;
pub mod task;
pub mod user;
