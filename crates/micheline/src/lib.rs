//! tzkit-micheline: the Micheline wire expression model.
//!
//! Micheline is the JSON tree grammar the node speaks for both type
//! expressions and value expressions: primitive applications
//! (`{"prim": .., "args": [..], "annots": [..]}`), integer, string and
//! bytes literals, and sequences. This crate parses and produces that
//! grammar byte-compatibly and layers the parsed [`TypeExpr`] form on
//! top of it for type expressions.
//!
//! Key types, re-exported at the crate root:
//!
//! - [`Micheline`] -- one wire expression node
//! - [`TypeExpr`] -- a validated, annotation-parsed type expression
//! - [`Prim`] -- the closed set of type primitives
//! - [`Annotations`] -- field / type / variable annotations
//! - [`MichelineError`] -- parse and validation errors

pub mod annots;
pub mod error;
pub mod expr;
pub mod types;

pub use annots::Annotations;
pub use error::MichelineError;
pub use expr::Micheline;
pub use types::{Prim, TypeExpr};
