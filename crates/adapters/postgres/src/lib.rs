//! storefront-adapter-postgres - PostgreSQL 适配器

mod connection;
mod database;
mod provision;
mod schema;

pub use connection::*;
pub use database::*;
pub use provision::*;
pub use schema::*;
