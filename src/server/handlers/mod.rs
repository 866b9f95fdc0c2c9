pub mod contexts;
pub mod files;
pub mod health;
pub mod query;
