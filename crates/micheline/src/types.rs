//! Parsed type expressions.
//!
//! A [`TypeExpr`] is the validated form of a Micheline type: the keyword
//! resolved to a [`Prim`], argument counts checked, comb pairs
//! normalized to binary form, and annotations parsed. Type expressions
//! are built once per contract interface and never mutated.

use crate::annots::Annotations;
use crate::error::MichelineError;
use crate::expr::Micheline;

/// The closed set of supported type primitives.
///
/// An unhandled primitive in an exhaustive match is a compile error
/// here, not a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Unit,
    Int,
    Nat,
    Mutez,
    String,
    Bytes,
    Bool,
    Timestamp,
    Address,
    Key,
    KeyHash,
    Signature,
    ChainId,
    Pair,
    Or,
    Option,
    List,
    Set,
    Map,
    BigMap,
    Lambda,
    Contract,
}

impl Prim {
    /// Resolve a wire keyword.
    pub fn from_keyword(kw: &str) -> Option<Prim> {
        Some(match kw {
            "unit" => Prim::Unit,
            "int" => Prim::Int,
            "nat" => Prim::Nat,
            "mutez" => Prim::Mutez,
            "string" => Prim::String,
            "bytes" => Prim::Bytes,
            "bool" => Prim::Bool,
            "timestamp" => Prim::Timestamp,
            "address" => Prim::Address,
            "key" => Prim::Key,
            "key_hash" => Prim::KeyHash,
            "signature" => Prim::Signature,
            "chain_id" => Prim::ChainId,
            "pair" => Prim::Pair,
            "or" => Prim::Or,
            "option" => Prim::Option,
            "list" => Prim::List,
            "set" => Prim::Set,
            "map" => Prim::Map,
            "big_map" => Prim::BigMap,
            "lambda" => Prim::Lambda,
            "contract" => Prim::Contract,
            _ => return None,
        })
    }

    /// The wire keyword for this primitive.
    pub fn keyword(&self) -> &'static str {
        match self {
            Prim::Unit => "unit",
            Prim::Int => "int",
            Prim::Nat => "nat",
            Prim::Mutez => "mutez",
            Prim::String => "string",
            Prim::Bytes => "bytes",
            Prim::Bool => "bool",
            Prim::Timestamp => "timestamp",
            Prim::Address => "address",
            Prim::Key => "key",
            Prim::KeyHash => "key_hash",
            Prim::Signature => "signature",
            Prim::ChainId => "chain_id",
            Prim::Pair => "pair",
            Prim::Or => "or",
            Prim::Option => "option",
            Prim::List => "list",
            Prim::Set => "set",
            Prim::Map => "map",
            Prim::BigMap => "big_map",
            Prim::Lambda => "lambda",
            Prim::Contract => "contract",
        }
    }

    /// Whether values of this primitive have a canonical total order,
    /// making it legal as a set element or map key.
    pub fn is_comparable(&self) -> bool {
        matches!(
            self,
            Prim::Int
                | Prim::Nat
                | Prim::Mutez
                | Prim::String
                | Prim::Bytes
                | Prim::Bool
                | Prim::Timestamp
                | Prim::Address
                | Prim::Key
                | Prim::KeyHash
                | Prim::Signature
                | Prim::ChainId
        )
    }
}

/// A validated type expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub prim: Prim,
    pub args: Vec<TypeExpr>,
    pub annots: Annotations,
    /// Lambda parameter/result types, kept as raw Micheline: they may
    /// mention instruction-domain types (e.g. `operation`) that are
    /// never encoded as data and so are not in [`Prim`].
    pub raw_args: Vec<Micheline>,
}

impl TypeExpr {
    /// Parse and validate a Micheline type expression.
    ///
    /// Checks keywords, argument arities, and key comparability, and
    /// normalizes comb pairs (`pair a b c ..`) into right-nested binary
    /// pairs. Fails on the first offending node.
    pub fn parse(expr: &Micheline) -> Result<TypeExpr, MichelineError> {
        let (prim, args, annots) = match expr {
            Micheline::Prim { prim, args, annots } => (prim, args, annots),
            other => {
                return Err(MichelineError::Malformed(format!(
                    "type expression must be a prim, got {}",
                    other.to_json()
                )))
            }
        };
        let parsed = Prim::from_keyword(prim).ok_or_else(|| MichelineError::UnsupportedType {
            prim: prim.clone(),
        })?;
        let annots = Annotations::parse(annots);

        check_arity(parsed, args.len())?;

        if parsed == Prim::Lambda {
            return Ok(TypeExpr {
                prim: Prim::Lambda,
                args: Vec::new(),
                annots,
                raw_args: args.clone(),
            });
        }

        let mut children = Vec::with_capacity(args.len());
        for arg in args {
            children.push(TypeExpr::parse(arg)?);
        }

        match parsed {
            Prim::Set => {
                if !children[0].prim.is_comparable() {
                    return Err(MichelineError::NotComparable {
                        prim: children[0].prim.keyword().to_string(),
                    });
                }
            }
            Prim::Map | Prim::BigMap => {
                if !children[0].prim.is_comparable() {
                    return Err(MichelineError::NotComparable {
                        prim: children[0].prim.keyword().to_string(),
                    });
                }
            }
            Prim::Pair if children.len() > 2 => {
                // Comb pair: fold the tail into right-nested binary pairs.
                let children = fold_comb(children);
                return Ok(TypeExpr {
                    prim: Prim::Pair,
                    args: children,
                    annots,
                    raw_args: Vec::new(),
                });
            }
            _ => {}
        }

        Ok(TypeExpr {
            prim: parsed,
            args: children,
            annots,
            raw_args: Vec::new(),
        })
    }
}

fn fold_comb(mut children: Vec<TypeExpr>) -> Vec<TypeExpr> {
    // children.len() > 2 on entry; result is exactly two children.
    while children.len() > 2 {
        let right = children.pop().and_then(|last| {
            children.pop().map(|second_last| TypeExpr {
                prim: Prim::Pair,
                args: vec![second_last, last],
                annots: Annotations::default(),
                raw_args: Vec::new(),
            })
        });
        if let Some(right) = right {
            children.push(right);
        }
    }
    children
}

fn check_arity(prim: Prim, got: usize) -> Result<(), MichelineError> {
    let ok = match prim {
        Prim::Pair => got >= 2,
        Prim::Or | Prim::Map | Prim::BigMap | Prim::Lambda => got == 2,
        Prim::Option | Prim::List | Prim::Set | Prim::Contract => got == 1,
        _ => got == 0,
    };
    if ok {
        return Ok(());
    }
    let expected = match prim {
        Prim::Pair => "at least 2",
        Prim::Or | Prim::Map | Prim::BigMap | Prim::Lambda => "2",
        Prim::Option | Prim::List | Prim::Set | Prim::Contract => "1",
        _ => "0",
    };
    Err(MichelineError::WrongArity {
        prim: prim.keyword().to_string(),
        expected: expected.to_string(),
        got,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: serde_json::Value) -> Result<TypeExpr, MichelineError> {
        TypeExpr::parse(&Micheline::from_json(&v).unwrap())
    }

    #[test]
    fn parses_annotated_pair() {
        let t = parse(json!({
            "prim": "pair",
            "args": [
                { "prim": "address", "annots": ["%addr"] },
                { "prim": "key_hash", "annots": ["%key"] }
            ]
        }))
        .unwrap();
        assert_eq!(t.prim, Prim::Pair);
        assert_eq!(t.args[0].annots.field.as_deref(), Some("addr"));
        assert_eq!(t.args[1].annots.field.as_deref(), Some("key"));
    }

    #[test]
    fn unknown_keyword_is_unsupported() {
        let err = parse(json!({ "prim": "sapling_state" })).unwrap_err();
        assert_eq!(
            err,
            MichelineError::UnsupportedType {
                prim: "sapling_state".to_string()
            }
        );
    }

    #[test]
    fn arity_is_checked() {
        let err = parse(json!({ "prim": "option" })).unwrap_err();
        assert!(matches!(err, MichelineError::WrongArity { .. }));
    }

    #[test]
    fn comb_pair_normalizes_right_nested() {
        let t = parse(json!({
            "prim": "pair",
            "args": [{ "prim": "int" }, { "prim": "nat" }, { "prim": "string" }]
        }))
        .unwrap();
        assert_eq!(t.args.len(), 2);
        assert_eq!(t.args[0].prim, Prim::Int);
        assert_eq!(t.args[1].prim, Prim::Pair);
        assert_eq!(t.args[1].args[0].prim, Prim::Nat);
        assert_eq!(t.args[1].args[1].prim, Prim::String);
    }

    #[test]
    fn non_comparable_map_key_rejected() {
        let err = parse(json!({
            "prim": "map",
            "args": [
                { "prim": "list", "args": [{ "prim": "int" }] },
                { "prim": "int" }
            ]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            MichelineError::NotComparable {
                prim: "list".to_string()
            }
        );
    }

    #[test]
    fn big_map_key_must_be_comparable() {
        let ok = parse(json!({
            "prim": "big_map",
            "args": [{ "prim": "address" }, { "prim": "nat" }]
        }));
        assert!(ok.is_ok());
    }
}
