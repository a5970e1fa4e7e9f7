//! # Expression Environment
//!
//! A small, sandboxed expression sublanguage for identity mapping.
//!
//! Mapping configurations transform database rows into identity fields via
//! expressions evaluated against a vocabulary of well-known bindings
//! (`cols`, `resource`, `principal`, `entitlement`, `input`,
//! `credentials`). Expressions are Rhai expressions with two pieces of
//! syntactic sugar applied before compilation:
//!
//! - a bare identifier is a string literal: `admin` -> `"admin"`
//! - a leading-dot name is a column reference: `.email` -> `cols["email"]`
//!
//! The environment hosts an extension-function catalog (`toUpper`,
//! `toLower`, `titleCase`, `slugify`, and the PHP associative-array
//! codec); see [`functions`].
//!
//! ```
//! use quarry_expr::{Env, Inputs};
//! use quarry_expr::rhai::{Dynamic, Map};
//!
//! let env = Env::new();
//! let mut cols = Map::new();
//! cols.insert("name".into(), Dynamic::from("ada lovelace".to_string()));
//! let mut inputs = Inputs::new();
//! inputs.set_row(cols);
//!
//! let out = env.evaluate_string("titleCase(.name)", &inputs).unwrap();
//! assert_eq!(out, "Ada Lovelace");
//! ```

pub mod env;
pub mod error;
pub mod functions;
pub mod inputs;
pub mod preprocess;

pub use env::Env;
pub use error::{ExprError, ExprResult};
pub use inputs::Inputs;
pub use preprocess::preprocess;

// Re-export the underlying engine types so downstream crates stay on the
// same rhai version.
pub use rhai;
pub use rhai::{Dynamic, Map};
