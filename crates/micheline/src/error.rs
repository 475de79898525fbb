/// Errors raised while parsing wire JSON into [`Micheline`](crate::Micheline)
/// or a [`TypeExpr`](crate::TypeExpr).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MichelineError {
    /// A JSON node is not a legal Micheline expression.
    #[error("malformed micheline node: {0}")]
    Malformed(String),

    /// A bytes literal is not hex of even length. Input case is
    /// accepted leniently; output is always lowercase.
    #[error("invalid bytes literal '{0}'")]
    InvalidBytes(String),

    /// An integer literal is not a canonical decimal.
    #[error("invalid int literal '{0}'")]
    InvalidInt(String),

    /// A type expression uses a keyword outside the supported set.
    #[error("unsupported type primitive '{prim}'")]
    UnsupportedType { prim: String },

    /// A type primitive was applied to the wrong number of arguments.
    #[error("'{prim}' expects {expected} argument(s), got {got}")]
    WrongArity {
        prim: String,
        expected: String,
        got: usize,
    },

    /// A set element or map key type is not comparable.
    #[error("'{prim}' is not usable as a set element or map key")]
    NotComparable { prim: String },
}
