//! Schema and codec errors.
//!
//! Every value-level failure carries the [`Path`] of the offending node
//! from the schema root, so a mismatch deep inside a nested structure is
//! localizable without dumping the whole tree.

use std::fmt;

use tzkit_micheline::MichelineError;

/// One step from a schema node to a child: a field name where named
/// access applies, an index otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    Field(String),
    Index(usize),
}

/// The location of a schema node, as segments from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(pub Vec<PathSeg>);

impl Path {
    pub fn root() -> Path {
        Path(Vec::new())
    }

    /// This path extended by one field segment.
    pub fn field(&self, name: &str) -> Path {
        let mut segs = self.0.clone();
        segs.push(PathSeg::Field(name.to_string()));
        Path(segs)
    }

    /// This path extended by one index segment.
    pub fn index(&self, idx: usize) -> Path {
        let mut segs = self.0.clone();
        segs.push(PathSeg::Index(idx));
        Path(segs)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match seg {
                PathSeg::Field(name) => write!(f, "{}", name)?,
                PathSeg::Index(idx) => write!(f, "{}", idx)?,
            }
        }
        Ok(())
    }
}

/// All errors the schema engine can return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The type expression itself is invalid (unknown primitive, wrong
    /// arity, non-comparable key). Raised by `Schema::new`, never later.
    #[error("invalid type expression: {0}")]
    Type(#[from] MichelineError),

    /// Two leaves inside one annotated pair/or chain share a field name.
    #[error("duplicate field annotation '%{name}' at {path}")]
    DuplicateAnnotation { name: String, path: Path },

    /// A positional encode ran out of arguments, or had arguments left
    /// over at the root.
    #[error("arity mismatch at {path}: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        path: Path,
        expected: usize,
        got: usize,
    },

    /// A native value's shape does not match the type at this node.
    #[error("schema mismatch at {path}: expected {expected}, got {got}")]
    SchemaMismatch {
        path: Path,
        expected: String,
        got: String,
    },

    /// A value expression is not in this primitive's wire grammar.
    #[error("malformed value at {path}: {message}")]
    MalformedValue { path: Path, message: String },

    /// A set element or map key occurred twice under canonical ordering.
    #[error("duplicate element at {path}: {key}")]
    DuplicateElement { path: Path, key: String },

    /// A name lookup missed the flattened field index.
    #[error("unknown field '{name}'")]
    UnknownField { name: String },

    /// The injected big-map fetcher failed. Key absence is NOT this
    /// error; a missing key is an `Ok(None)` from `BigMapHandle::get`.
    #[error("big map fetch failed for id {id}: {message}")]
    Fetch { id: String, message: String },
}
