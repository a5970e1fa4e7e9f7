//! # SQL Connector
//!
//! A declarative SQL-to-identity synchronization engine.
//!
//! A YAML document describes resource types, SQL queries, and mapping
//! expressions; the engine pages through an external relational database
//! and emits a canonical stream of resources, entitlements, and grants. It
//! also executes provisioning statement sequences that grant or revoke
//! entitlements and create accounts.
//!
//! ## Architecture
//!
//! - [`config`] - Typed configuration tree parsed once at startup
//! - [`database`] - The [`Database`](database::Database) driver seam,
//!   dialects, and the bundled sqlx implementation
//! - [`query`] - Dialect-aware query templater and paginated executor
//! - [`time`] - Multi-format time parsing with dialect priorities
//! - [`syncer`] - [`SqlSyncer`](syncer::SqlSyncer) per resource type and
//!   the [`SqlConnector`](syncer::SqlConnector) assembly
//!
//! Queries are templated with `?<KEY>` placeholders, rewritten into the
//! target dialect's bind-parameter syntax. Pagination uses lookahead: the
//! executor requests one row beyond the page size, and the presence of
//! that row produces a non-empty next-page token.
//!
//! ## Example
//!
//! ```ignore
//! use quarry_connector::prelude::*;
//! use quarry_connector_sql::{Config, SqlConnector};
//!
//! let config = Config::from_file("config.yaml")?;
//! let connector = SqlConnector::connect(config).await?;
//!
//! for syncer in connector.resource_syncers()? {
//!     let mut token = PageToken::first();
//!     loop {
//!         let page = syncer.list(&token).await?;
//!         for resource in &page.items {
//!             println!("{}", resource.id);
//!         }
//!         if !page.has_next_page() {
//!             break;
//!         }
//!         token = PageToken::with_token(page.next_page_token);
//!     }
//! }
//! ```

pub mod config;
pub mod database;
pub mod inputs;
pub mod query;
pub mod syncer;
pub mod time;

mod entitlements;
mod grants;
mod provisioning;
mod resources;

pub use config::Config;
pub use database::{connect, Database, DatabaseTransaction, Dialect, SqlRow, SqlValue};
pub use syncer::{SqlConnector, SqlSyncer};
pub use time::{parse_time, parse_time_with_dialect};
