//! tzkit-encoder: the type-directed Michelson value codec.
//!
//! Given a contract's parameter or storage type expression, a
//! [`Schema`] encodes native [`Value`]s into canonical Micheline value
//! expressions, decodes value expressions from the chain back into
//! native values, and describes the expected native shape. Big maps are
//! never materialized: they decode to lazy [`BigMapHandle`]s that fetch
//! one entry at a time through an injected [`BigMapFetcher`].
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use tzkit_encoder::{BigMapFetcher, Schema, StaticFetcher, Value};
//! use tzkit_micheline::Micheline;
//!
//! let ty = Micheline::from_json(&json!({
//!     "prim": "pair",
//!     "args": [
//!         { "prim": "nat", "annots": ["%counter"] },
//!         { "prim": "string", "annots": ["%greeting"] }
//!     ]
//! })).unwrap();
//! let schema = Schema::new(&ty).unwrap();
//!
//! let native = Value::record([
//!     ("counter", Value::int(7)),
//!     ("greeting", Value::string("hello")),
//! ]);
//! let expr = schema.encode(&native).unwrap();
//!
//! let fetcher: Arc<dyn BigMapFetcher> = Arc::new(StaticFetcher::empty());
//! assert_eq!(schema.decode(&expr, &fetcher).unwrap(), native);
//! ```

pub mod bigint;
pub mod bigmap;
pub mod error;
pub mod schema;
pub mod token;
pub mod value;

pub use bigint::{BigInt, ParseBigIntError};
pub use bigmap::{BigMapFetcher, BigMapHandle, FetchError, StaticFetcher};
pub use error::{Path, PathSeg, SchemaError};
pub use schema::{Schema, SchemaDescription, Section};
pub use token::{Access, Token, TokenKind};
pub use value::Value;
