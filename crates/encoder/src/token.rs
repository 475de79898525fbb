//! Codec tokens: one node per type-expression node.
//!
//! A token is a pure function of its type expression. The whole tree is
//! built once by [`Schema::new`](crate::schema::Schema::new) and is
//! immutable afterward, so concurrent encodes and decodes need no
//! synchronization. Named vs positional access for `pair`/`or` groups
//! is resolved here, at construction, never re-derived per call.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::{json, Value as Json};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use tzkit_micheline::{Annotations, Micheline, Prim, TypeExpr};

use crate::bigint::BigInt;
use crate::bigmap::{BigMapFetcher, BigMapHandle};
use crate::error::{Path, SchemaError};
use crate::value::Value;

/// How a `pair`/`or` group presents its children: a record keyed by
/// field annotations when every leaf of the flattened group carries
/// one, an ordered sequence otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Named { fields: Vec<String> },
    Positional { arity: usize },
}

/// One codec node, dispatched exhaustively on its primitive.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub annots: Annotations,
}

#[derive(Debug, Clone)]
pub enum TokenKind {
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
    Contract {
        parameter: Box<Token>,
    },
    Pair {
        access: Access,
        left: Box<Token>,
        right: Box<Token>,
    },
    Or {
        access: Access,
        left: Box<Token>,
        right: Box<Token>,
    },
    Option {
        inner: Box<Token>,
    },
    List {
        element: Box<Token>,
    },
    Set {
        element: Box<Token>,
    },
    Map {
        key: Box<Token>,
        value: Box<Token>,
    },
    BigMap {
        key: Arc<Token>,
        value: Arc<Token>,
    },
    /// Lambda argument types are carried opaquely: they may mention
    /// instruction-domain types (`operation`) this codec never encodes.
    Lambda {
        parameter: Micheline,
        result: Micheline,
    },
}

impl Token {
    /// Build the token tree for a validated type expression.
    ///
    /// The only failure mode is a field-annotation collision inside an
    /// unbroken annotated `pair`/`or` chain; everything else was already
    /// rejected by `TypeExpr::parse`.
    pub fn build(ty: &TypeExpr, path: &Path) -> Result<Token, SchemaError> {
        let kind = match ty.prim {
            Prim::Unit => TokenKind::Unit,
            Prim::Int => TokenKind::Int,
            Prim::Nat => TokenKind::Nat,
            Prim::Mutez => TokenKind::Mutez,
            Prim::String => TokenKind::String,
            Prim::Bytes => TokenKind::Bytes,
            Prim::Bool => TokenKind::Bool,
            Prim::Timestamp => TokenKind::Timestamp,
            Prim::Address => TokenKind::Address,
            Prim::Key => TokenKind::Key,
            Prim::KeyHash => TokenKind::KeyHash,
            Prim::Signature => TokenKind::Signature,
            Prim::ChainId => TokenKind::ChainId,
            Prim::Contract => TokenKind::Contract {
                parameter: Box::new(Token::build(&ty.args[0], &path.index(0))?),
            },
            Prim::Pair => {
                let left = Box::new(Token::build(&ty.args[0], &path.index(0))?);
                let right = Box::new(Token::build(&ty.args[1], &path.index(1))?);
                let access = resolve_access(&left, &right, GroupKind::Pair, path)?;
                TokenKind::Pair {
                    access,
                    left,
                    right,
                }
            }
            Prim::Or => {
                let left = Box::new(Token::build(&ty.args[0], &path.index(0))?);
                let right = Box::new(Token::build(&ty.args[1], &path.index(1))?);
                let access = resolve_access(&left, &right, GroupKind::Or, path)?;
                TokenKind::Or {
                    access,
                    left,
                    right,
                }
            }
            Prim::Option => TokenKind::Option {
                inner: Box::new(Token::build(&ty.args[0], &path.index(0))?),
            },
            Prim::List => TokenKind::List {
                element: Box::new(Token::build(&ty.args[0], &path.index(0))?),
            },
            Prim::Set => TokenKind::Set {
                element: Box::new(Token::build(&ty.args[0], &path.index(0))?),
            },
            Prim::Map => TokenKind::Map {
                key: Box::new(Token::build(&ty.args[0], &path.index(0))?),
                value: Box::new(Token::build(&ty.args[1], &path.index(1))?),
            },
            Prim::BigMap => TokenKind::BigMap {
                key: Arc::new(Token::build(&ty.args[0], &path.index(0))?),
                value: Arc::new(Token::build(&ty.args[1], &path.index(1))?),
            },
            Prim::Lambda => TokenKind::Lambda {
                parameter: ty.raw_args[0].clone(),
                result: ty.raw_args[1].clone(),
            },
        };
        Ok(Token {
            kind,
            annots: ty.annots.clone(),
        })
    }

    /// The flattened leaves of this node's `pair`/`or` group, in order.
    /// Meaningful only for `Pair`/`Or` tokens; other kinds yield nothing.
    pub fn group_leaves(&self) -> Vec<(Option<&str>, &Token)> {
        let mut out = Vec::new();
        match &self.kind {
            TokenKind::Pair { left, right, .. } => {
                collect_leaves(left, GroupKind::Pair, &mut out);
                collect_leaves(right, GroupKind::Pair, &mut out);
            }
            TokenKind::Or { left, right, .. } => {
                collect_leaves(left, GroupKind::Or, &mut out);
                collect_leaves(right, GroupKind::Or, &mut out);
            }
            _ => {}
        }
        out
    }

    // ── Positional encode ────────────────────────────────────────────

    /// Encode from an ordered argument queue. A `pair` consumes its
    /// group recursively; every other node consumes exactly one value.
    pub fn encode_positional(
        &self,
        args: &mut VecDeque<Value>,
        path: &Path,
    ) -> Result<Micheline, SchemaError> {
        match &self.kind {
            TokenKind::Pair { left, right, .. } => {
                let l = encode_positional_part(left, args, &path.index(0))?;
                let r = encode_positional_part(right, args, &path.index(1))?;
                Ok(Micheline::prim_with("Pair", vec![l, r]))
            }
            TokenKind::Unit => {
                // Consumes its slot, value ignored.
                args.pop_front().ok_or_else(|| SchemaError::ArityMismatch {
                    path: path.clone(),
                    expected: 1,
                    got: 0,
                })?;
                Ok(Micheline::prim("Unit"))
            }
            _ => {
                let v = args.pop_front().ok_or_else(|| SchemaError::ArityMismatch {
                    path: path.clone(),
                    expected: 1,
                    got: 0,
                })?;
                self.encode_object(&v, path)
            }
        }
    }

    // ── Structured encode ────────────────────────────────────────────

    /// Encode one structured native value into its value expression.
    pub fn encode_object(&self, value: &Value, path: &Path) -> Result<Micheline, SchemaError> {
        match &self.kind {
            TokenKind::Unit => match value {
                Value::Unit => Ok(Micheline::prim("Unit")),
                other => Err(mismatch(path, "unit", other)),
            },
            TokenKind::Int => encode_int(value, false, "int", path),
            TokenKind::Nat => encode_int(value, true, "nat", path),
            TokenKind::Mutez => encode_int(value, true, "mutez", path),
            TokenKind::String => encode_text(value, "string", path),
            TokenKind::Address => encode_text(value, "address", path),
            TokenKind::Key => encode_text(value, "key", path),
            TokenKind::KeyHash => encode_text(value, "key_hash", path),
            TokenKind::Signature => encode_text(value, "signature", path),
            TokenKind::ChainId => encode_text(value, "chain_id", path),
            TokenKind::Contract { .. } => encode_text(value, "contract address", path),
            TokenKind::Bytes => match value {
                Value::Bytes(b) => Ok(Micheline::Bytes(b.clone())),
                other => Err(mismatch(path, "bytes", other)),
            },
            TokenKind::Bool => match value {
                Value::Bool(true) => Ok(Micheline::prim("True")),
                Value::Bool(false) => Ok(Micheline::prim("False")),
                other => Err(mismatch(path, "bool", other)),
            },
            TokenKind::Timestamp => encode_timestamp(value, path),
            TokenKind::Pair {
                access,
                left,
                right,
            } => match access {
                Access::Named { fields } => {
                    let record = match value {
                        Value::Record(r) => r,
                        other => return Err(mismatch(path, "record", other)),
                    };
                    let mut extra: Vec<&str> =
                        record.keys().map(String::as_str).collect();
                    extra.retain(|k| !fields.iter().any(|f| f == k));
                    if let Some(unknown) = extra.first() {
                        return Err(SchemaError::SchemaMismatch {
                            path: path.clone(),
                            expected: format!("fields {:?}", fields),
                            got: format!("unexpected field '{}'", unknown),
                        });
                    }
                    encode_pair_named(left, right, record, path)
                }
                Access::Positional { arity } => {
                    let items = match value {
                        Value::List(items) => items,
                        other => return Err(mismatch(path, "tuple", other)),
                    };
                    if items.len() != *arity {
                        return Err(SchemaError::ArityMismatch {
                            path: path.clone(),
                            expected: *arity,
                            got: items.len(),
                        });
                    }
                    let mut queue: VecDeque<Value> = items.iter().cloned().collect();
                    let l = encode_positional_part(left, &mut queue, &path.index(0))?;
                    let r = encode_positional_part(right, &mut queue, &path.index(1))?;
                    Ok(Micheline::prim_with("Pair", vec![l, r]))
                }
            },
            TokenKind::Or {
                access,
                left,
                right,
            } => match access {
                Access::Named { fields } => {
                    let record = match value {
                        Value::Record(r) => r,
                        other => return Err(mismatch(path, "single-field record", other)),
                    };
                    if record.len() != 1 {
                        return Err(SchemaError::SchemaMismatch {
                            path: path.clone(),
                            expected: "exactly one populated branch".to_string(),
                            got: format!("{} fields", record.len()),
                        });
                    }
                    // SAFETY: len() == 1 checked above
                    let (name, inner) = record.iter().next().unwrap();
                    match encode_or_named(left, right, name, inner, path)? {
                        Some(expr) => Ok(expr),
                        None => Err(SchemaError::SchemaMismatch {
                            path: path.clone(),
                            expected: format!("one of {:?}", fields),
                            got: format!("field '{}'", name),
                        }),
                    }
                }
                Access::Positional { .. } => match value {
                    Value::Left(v) => Ok(Micheline::prim_with(
                        "Left",
                        vec![left.encode_object(v, &path.index(0))?],
                    )),
                    Value::Right(v) => Ok(Micheline::prim_with(
                        "Right",
                        vec![right.encode_object(v, &path.index(1))?],
                    )),
                    other => Err(mismatch(path, "left or right", other)),
                },
            },
            TokenKind::Option { inner } => match value {
                Value::None => Ok(Micheline::prim("None")),
                Value::Some(v) => Ok(Micheline::prim_with(
                    "Some",
                    vec![inner.encode_object(v, path)?],
                )),
                bare => Ok(Micheline::prim_with(
                    "Some",
                    vec![inner.encode_object(bare, path)?],
                )),
            },
            TokenKind::List { element } => match value {
                Value::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        out.push(element.encode_object(item, &path.index(i))?);
                    }
                    Ok(Micheline::Seq(out))
                }
                other => Err(mismatch(path, "list", other)),
            },
            TokenKind::Set { element } => match value {
                Value::List(items) => {
                    let mut encoded = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        encoded.push(element.encode_object(item, &path.index(i))?);
                    }
                    sort_canonical(&mut encoded, element_prim(element), path)?;
                    Ok(Micheline::Seq(encoded))
                }
                other => Err(mismatch(path, "set", other)),
            },
            TokenKind::Map { key, value: val } => match value {
                Value::Map(entries) => {
                    let mut encoded = Vec::with_capacity(entries.len());
                    for (i, (k, v)) in entries.iter().enumerate() {
                        let ek = key.encode_object(k, &path.index(i))?;
                        let ev = val.encode_object(v, &path.index(i))?;
                        encoded.push((ek, ev));
                    }
                    sort_entries_canonical(&mut encoded, element_prim(key), path)?;
                    let elts = encoded
                        .into_iter()
                        .map(|(k, v)| Micheline::prim_with("Elt", vec![k, v]))
                        .collect();
                    Ok(Micheline::Seq(elts))
                }
                other => Err(mismatch(path, "map", other)),
            },
            TokenKind::BigMap { .. } => match value {
                // Contents are never re-serialized; the pointer is.
                Value::BigMap(handle) => Ok(Micheline::Int(handle.id().as_str().to_string())),
                Value::Int(id) => Ok(Micheline::Int(id.as_str().to_string())),
                other => Err(mismatch(path, "big_map id", other)),
            },
            TokenKind::Lambda { .. } => match value {
                Value::Lambda(code) => Ok(code.clone()),
                other => Err(mismatch(path, "lambda code", other)),
            },
        }
    }

    // ── Decode ───────────────────────────────────────────────────────

    /// Decode a value expression into a native value. Every big-map
    /// pointer becomes a handle bound to `fetcher`.
    pub fn decode(
        &self,
        expr: &Micheline,
        path: &Path,
        fetcher: &Arc<dyn BigMapFetcher>,
    ) -> Result<Value, SchemaError> {
        match &self.kind {
            TokenKind::Unit => match expr {
                Micheline::Prim { prim, .. } if prim == "Unit" => Ok(Value::Unit),
                other => Err(unexpected(path, "Unit", other)),
            },
            TokenKind::Int => decode_int(expr, false, path),
            TokenKind::Nat | TokenKind::Mutez => decode_int(expr, true, path),
            TokenKind::String
            | TokenKind::Address
            | TokenKind::Key
            | TokenKind::KeyHash
            | TokenKind::Signature
            | TokenKind::ChainId
            | TokenKind::Contract { .. } => match expr {
                Micheline::String(s) => Ok(Value::String(s.clone())),
                other => Err(unexpected(path, "a string literal", other)),
            },
            TokenKind::Bytes => match expr {
                Micheline::Bytes(b) => Ok(Value::Bytes(b.clone())),
                other => Err(unexpected(path, "a bytes literal", other)),
            },
            TokenKind::Bool => match expr {
                Micheline::Prim { prim, .. } if prim == "True" => Ok(Value::Bool(true)),
                Micheline::Prim { prim, .. } if prim == "False" => Ok(Value::Bool(false)),
                other => Err(unexpected(path, "True or False", other)),
            },
            TokenKind::Timestamp => decode_timestamp(expr, path),
            TokenKind::Pair { access, .. } => {
                let args = match expr {
                    Micheline::Prim { prim, args, .. } if prim == "Pair" && args.len() >= 2 => {
                        args
                    }
                    other => return Err(unexpected(path, "Pair", other)),
                };
                match access {
                    Access::Named { .. } => {
                        let mut record = std::collections::BTreeMap::new();
                        decode_pair_named(self, args, path, fetcher, &mut record)?;
                        Ok(Value::Record(record))
                    }
                    Access::Positional { .. } => {
                        let mut items = Vec::new();
                        decode_pair_positional(self, args, path, fetcher, &mut items)?;
                        Ok(Value::List(items))
                    }
                }
            }
            TokenKind::Or {
                access,
                left,
                right,
            } => {
                let (is_left, inner) = match expr {
                    Micheline::Prim { prim, args, .. } if prim == "Left" && args.len() == 1 => {
                        (true, &args[0])
                    }
                    Micheline::Prim { prim, args, .. } if prim == "Right" && args.len() == 1 => {
                        (false, &args[0])
                    }
                    other => return Err(unexpected(path, "Left or Right", other)),
                };
                let side = if is_left { left } else { right };
                let idx = usize::from(!is_left);
                match access {
                    Access::Named { .. } => {
                        decode_or_named(side, inner, &path.index(idx), fetcher)
                    }
                    Access::Positional { .. } => {
                        let v = side.decode(inner, &path.index(idx), fetcher)?;
                        Ok(if is_left {
                            Value::Left(Box::new(v))
                        } else {
                            Value::Right(Box::new(v))
                        })
                    }
                }
            }
            TokenKind::Option { inner } => match expr {
                Micheline::Prim { prim, .. } if prim == "None" => Ok(Value::None),
                Micheline::Prim { prim, args, .. } if prim == "Some" && args.len() == 1 => Ok(
                    Value::Some(Box::new(inner.decode(&args[0], path, fetcher)?)),
                ),
                other => Err(unexpected(path, "Some or None", other)),
            },
            TokenKind::List { element } | TokenKind::Set { element } => match expr {
                Micheline::Seq(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        out.push(element.decode(item, &path.index(i), fetcher)?);
                    }
                    Ok(Value::List(out))
                }
                other => Err(unexpected(path, "a sequence", other)),
            },
            TokenKind::Map { key, value } => match expr {
                Micheline::Seq(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        let (k, v) = match item {
                            Micheline::Prim { prim, args, .. }
                                if prim == "Elt" && args.len() == 2 =>
                            {
                                (&args[0], &args[1])
                            }
                            other => return Err(unexpected(&path.index(i), "Elt", other)),
                        };
                        let dk = key.decode(k, &path.index(i), fetcher)?;
                        let dv = value.decode(v, &path.index(i), fetcher)?;
                        out.push((dk, dv));
                    }
                    Ok(Value::Map(out))
                }
                other => Err(unexpected(path, "a sequence of Elt", other)),
            },
            TokenKind::BigMap { key, value } => match expr {
                // Never materialized: only the on-chain pointer is read.
                Micheline::Int(id) => {
                    let id = BigInt::parse(id).map_err(|_| {
                        malformed(path, format!("big_map id '{}' is not an integer", id))
                    })?;
                    Ok(Value::BigMap(BigMapHandle::new(
                        id,
                        Arc::clone(key),
                        Arc::clone(value),
                        Arc::clone(fetcher),
                    )))
                }
                other => Err(unexpected(path, "a big_map id", other)),
            },
            TokenKind::Lambda { .. } => Ok(Value::Lambda(expr.clone())),
        }
    }

    // ── Describe ─────────────────────────────────────────────────────

    /// A serializable description of the expected native shape.
    pub fn describe(&self) -> Json {
        match &self.kind {
            TokenKind::Unit => json!("unit"),
            TokenKind::Int => json!("int"),
            TokenKind::Nat => json!("nat"),
            TokenKind::Mutez => json!("mutez"),
            TokenKind::String => json!("string"),
            TokenKind::Bytes => json!("bytes"),
            TokenKind::Bool => json!("bool"),
            TokenKind::Timestamp => json!("timestamp"),
            TokenKind::Address => json!("address"),
            TokenKind::Key => json!("key"),
            TokenKind::KeyHash => json!("key_hash"),
            TokenKind::Signature => json!("signature"),
            TokenKind::ChainId => json!("chain_id"),
            TokenKind::Contract { parameter } => json!({ "contract": parameter.describe() }),
            TokenKind::Pair { access, .. } => {
                let leaves = self.group_leaves();
                match access {
                    Access::Named { .. } => {
                        let mut fields = serde_json::Map::new();
                        for (name, leaf) in leaves {
                            // SAFETY: Named access implies every leaf is annotated
                            fields.insert(name.unwrap().to_string(), leaf.describe());
                        }
                        Json::Object(fields)
                    }
                    Access::Positional { .. } => {
                        Json::Array(leaves.iter().map(|(_, leaf)| leaf.describe()).collect())
                    }
                }
            }
            TokenKind::Or { access, .. } => {
                let leaves = self.group_leaves();
                match access {
                    Access::Named { .. } => {
                        let mut branches = serde_json::Map::new();
                        for (name, leaf) in leaves {
                            // SAFETY: Named access implies every leaf is annotated
                            branches.insert(name.unwrap().to_string(), leaf.describe());
                        }
                        json!({ "or": Json::Object(branches) })
                    }
                    Access::Positional { .. } => {
                        let rendered: Vec<Json> =
                            leaves.iter().map(|(_, leaf)| leaf.describe()).collect();
                        json!({ "or": rendered })
                    }
                }
            }
            TokenKind::Option { inner } => json!({ "option": inner.describe() }),
            TokenKind::List { element } => json!({ "list": element.describe() }),
            TokenKind::Set { element } => json!({ "set": element.describe() }),
            TokenKind::Map { key, value } => {
                json!({ "map": { "key": key.describe(), "value": value.describe() } })
            }
            TokenKind::BigMap { key, value } => {
                json!({ "big_map": { "key": key.describe(), "value": value.describe() } })
            }
            TokenKind::Lambda { parameter, result } => {
                json!({ "lambda": { "parameter": parameter.to_json(), "result": result.to_json() } })
            }
        }
    }
}

// ── Group analysis ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Pair,
    Or,
}

fn in_group(token: &Token, kind: GroupKind) -> bool {
    token.annots.field.is_none()
        && match (kind, &token.kind) {
            (GroupKind::Pair, TokenKind::Pair { .. }) => true,
            (GroupKind::Or, TokenKind::Or { .. }) => true,
            _ => false,
        }
}

fn collect_leaves<'a>(token: &'a Token, kind: GroupKind, out: &mut Vec<(Option<&'a str>, &'a Token)>) {
    if in_group(token, kind) {
        let (left, right) = match &token.kind {
            TokenKind::Pair { left, right, .. } | TokenKind::Or { left, right, .. } => {
                (left, right)
            }
            // in_group only matches Pair/Or
            _ => return,
        };
        collect_leaves(left, kind, out);
        collect_leaves(right, kind, out);
    } else {
        out.push((token.annots.field_name(), token));
    }
}

fn resolve_access(
    left: &Token,
    right: &Token,
    kind: GroupKind,
    path: &Path,
) -> Result<Access, SchemaError> {
    let mut leaves = Vec::new();
    collect_leaves(left, kind, &mut leaves);
    collect_leaves(right, kind, &mut leaves);

    if leaves.iter().all(|(name, _)| name.is_some()) {
        let mut fields = Vec::with_capacity(leaves.len());
        for (name, _) in &leaves {
            // SAFETY: all() above guarantees every name is Some
            let name = name.unwrap();
            if fields.iter().any(|f| f == name) {
                return Err(SchemaError::DuplicateAnnotation {
                    name: name.to_string(),
                    path: path.clone(),
                });
            }
            fields.push(name.to_string());
        }
        Ok(Access::Named { fields })
    } else {
        // Mixed annotated/unannotated siblings degrade to positional.
        Ok(Access::Positional {
            arity: leaves.len(),
        })
    }
}

// A group-breaking child (annotated, or not a pair at all) consumes one
// queue slot; an in-group pair keeps flattening.
fn encode_positional_part(
    child: &Token,
    args: &mut VecDeque<Value>,
    path: &Path,
) -> Result<Micheline, SchemaError> {
    if in_group(child, GroupKind::Pair) {
        return child.encode_positional(args, path);
    }
    let v = args.pop_front().ok_or_else(|| SchemaError::ArityMismatch {
        path: path.clone(),
        expected: 1,
        got: 0,
    })?;
    match &child.kind {
        // Consumes its slot, value ignored.
        TokenKind::Unit => Ok(Micheline::prim("Unit")),
        _ => child.encode_object(&v, path),
    }
}

// ── Named pair/or walks ──────────────────────────────────────────────

fn encode_pair_named(
    left: &Token,
    right: &Token,
    record: &std::collections::BTreeMap<String, Value>,
    path: &Path,
) -> Result<Micheline, SchemaError> {
    let l = encode_pair_part(left, record, path)?;
    let r = encode_pair_part(right, record, path)?;
    Ok(Micheline::prim_with("Pair", vec![l, r]))
}

fn encode_pair_part(
    child: &Token,
    record: &std::collections::BTreeMap<String, Value>,
    path: &Path,
) -> Result<Micheline, SchemaError> {
    if in_group(child, GroupKind::Pair) {
        if let TokenKind::Pair { left, right, .. } = &child.kind {
            return encode_pair_named(left, right, record, path);
        }
    }
    // SAFETY: named access guarantees every group leaf is annotated
    let name = child.annots.field_name().unwrap();
    let child_path = path.field(name);
    let value = record.get(name).ok_or_else(|| SchemaError::SchemaMismatch {
        path: child_path.clone(),
        expected: format!("field '{}'", name),
        got: "missing field".to_string(),
    })?;
    child.encode_object(value, &child_path)
}

fn encode_or_named(
    left: &Token,
    right: &Token,
    name: &str,
    value: &Value,
    path: &Path,
) -> Result<Option<Micheline>, SchemaError> {
    if let Some(expr) = encode_or_part(left, name, value, path)? {
        return Ok(Some(Micheline::prim_with("Left", vec![expr])));
    }
    if let Some(expr) = encode_or_part(right, name, value, path)? {
        return Ok(Some(Micheline::prim_with("Right", vec![expr])));
    }
    Ok(None)
}

fn encode_or_part(
    child: &Token,
    name: &str,
    value: &Value,
    path: &Path,
) -> Result<Option<Micheline>, SchemaError> {
    if in_group(child, GroupKind::Or) {
        if let TokenKind::Or { left, right, .. } = &child.kind {
            return encode_or_named(left, right, name, value, path);
        }
    }
    if child.annots.field_name() == Some(name) {
        return child.encode_object(value, &path.field(name)).map(Some);
    }
    Ok(None)
}

fn decode_pair_named(
    token: &Token,
    args: &[Micheline],
    path: &Path,
    fetcher: &Arc<dyn BigMapFetcher>,
    out: &mut std::collections::BTreeMap<String, Value>,
) -> Result<(), SchemaError> {
    let (left, right) = match &token.kind {
        TokenKind::Pair { left, right, .. } => (left, right),
        // Callers only reach here with a Pair token.
        _ => return Ok(()),
    };
    let rest;
    let (first, second) = if args.len() == 2 {
        (&args[0], &args[1])
    } else {
        // Comb pair on the wire: fold the tail.
        rest = Micheline::prim_with("Pair", args[1..].to_vec());
        (&args[0], &rest)
    };
    decode_pair_part_named(left, first, path, fetcher, out)?;
    decode_pair_part_named(right, second, path, fetcher, out)
}

fn decode_pair_part_named(
    child: &Token,
    expr: &Micheline,
    path: &Path,
    fetcher: &Arc<dyn BigMapFetcher>,
    out: &mut std::collections::BTreeMap<String, Value>,
) -> Result<(), SchemaError> {
    if in_group(child, GroupKind::Pair) {
        let args = match expr {
            Micheline::Prim { prim, args, .. } if prim == "Pair" && args.len() >= 2 => args,
            other => return Err(unexpected(path, "Pair", other)),
        };
        return decode_pair_named(child, args, path, fetcher, out);
    }
    // SAFETY: named access guarantees every group leaf is annotated
    let name = child.annots.field_name().unwrap();
    let v = child.decode(expr, &path.field(name), fetcher)?;
    out.insert(name.to_string(), v);
    Ok(())
}

fn decode_pair_positional(
    token: &Token,
    args: &[Micheline],
    path: &Path,
    fetcher: &Arc<dyn BigMapFetcher>,
    out: &mut Vec<Value>,
) -> Result<(), SchemaError> {
    let (left, right) = match &token.kind {
        TokenKind::Pair { left, right, .. } => (left, right),
        _ => return Ok(()),
    };
    let rest;
    let (first, second) = if args.len() == 2 {
        (&args[0], &args[1])
    } else {
        rest = Micheline::prim_with("Pair", args[1..].to_vec());
        (&args[0], &rest)
    };
    decode_pair_part_positional(left, first, path, fetcher, out)?;
    decode_pair_part_positional(right, second, path, fetcher, out)
}

fn decode_pair_part_positional(
    child: &Token,
    expr: &Micheline,
    path: &Path,
    fetcher: &Arc<dyn BigMapFetcher>,
    out: &mut Vec<Value>,
) -> Result<(), SchemaError> {
    if in_group(child, GroupKind::Pair) {
        let args = match expr {
            Micheline::Prim { prim, args, .. } if prim == "Pair" && args.len() >= 2 => args,
            other => return Err(unexpected(path, "Pair", other)),
        };
        return decode_pair_positional(child, args, path, fetcher, out);
    }
    let idx = out.len();
    let v = child.decode(expr, &path.index(idx), fetcher)?;
    out.push(v);
    Ok(())
}

fn decode_or_named(
    side: &Token,
    inner: &Micheline,
    path: &Path,
    fetcher: &Arc<dyn BigMapFetcher>,
) -> Result<Value, SchemaError> {
    if in_group(side, GroupKind::Or) {
        return side.decode(inner, path, fetcher);
    }
    // SAFETY: named access guarantees every group leaf is annotated
    let name = side.annots.field_name().unwrap();
    let v = side.decode(inner, &path.field(name), fetcher)?;
    let mut record = std::collections::BTreeMap::new();
    record.insert(name.to_string(), v);
    Ok(Value::Record(record))
}

// ── Scalar helpers ───────────────────────────────────────────────────

fn mismatch(path: &Path, expected: &str, got: &Value) -> SchemaError {
    SchemaError::SchemaMismatch {
        path: path.clone(),
        expected: expected.to_string(),
        got: got.kind_name().to_string(),
    }
}

fn malformed(path: &Path, message: impl Into<String>) -> SchemaError {
    SchemaError::MalformedValue {
        path: path.clone(),
        message: message.into(),
    }
}

fn unexpected(path: &Path, expected: &str, got: &Micheline) -> SchemaError {
    malformed(path, format!("expected {}, got {}", expected, got.to_json()))
}

fn encode_int(
    value: &Value,
    unsigned: bool,
    kind: &str,
    path: &Path,
) -> Result<Micheline, SchemaError> {
    let v = match value {
        Value::Int(v) => v,
        other => return Err(mismatch(path, kind, other)),
    };
    if unsigned && v.is_negative() {
        return Err(SchemaError::SchemaMismatch {
            path: path.clone(),
            expected: kind.to_string(),
            got: format!("negative value {}", v),
        });
    }
    Ok(Micheline::Int(v.as_str().to_string()))
}

fn decode_int(expr: &Micheline, unsigned: bool, path: &Path) -> Result<Value, SchemaError> {
    let text = match expr {
        Micheline::Int(text) => text,
        other => return Err(unexpected(path, "an int literal", other)),
    };
    let v = BigInt::parse(text)
        .map_err(|_| malformed(path, format!("'{}' is not a decimal integer", text)))?;
    if unsigned && v.is_negative() {
        return Err(malformed(path, format!("negative value {}", v)));
    }
    Ok(Value::Int(v))
}

fn encode_text(value: &Value, kind: &str, path: &Path) -> Result<Micheline, SchemaError> {
    match value {
        Value::String(s) => Ok(Micheline::String(s.clone())),
        other => Err(mismatch(path, kind, other)),
    }
}

fn encode_timestamp(value: &Value, path: &Path) -> Result<Micheline, SchemaError> {
    // Canonical direction: always the RFC-3339 string form.
    match value {
        Value::Timestamp(s) | Value::String(s) => {
            let parsed = OffsetDateTime::parse(s, &Rfc3339)
                .map_err(|e| malformed(path, format!("'{}' is not RFC-3339: {}", s, e)))?;
            Ok(Micheline::String(format_rfc3339(&parsed, path)?))
        }
        Value::Int(secs) => {
            let parsed = seconds_to_datetime(secs.as_str(), path)?;
            Ok(Micheline::String(format_rfc3339(&parsed, path)?))
        }
        other => Err(mismatch(path, "timestamp", other)),
    }
}

fn decode_timestamp(expr: &Micheline, path: &Path) -> Result<Value, SchemaError> {
    match expr {
        Micheline::String(s) => {
            let parsed = OffsetDateTime::parse(s, &Rfc3339)
                .map_err(|e| malformed(path, format!("'{}' is not RFC-3339: {}", s, e)))?;
            Ok(Value::Timestamp(format_rfc3339(&parsed, path)?))
        }
        Micheline::Int(secs) => {
            let parsed = seconds_to_datetime(secs, path)?;
            Ok(Value::Timestamp(format_rfc3339(&parsed, path)?))
        }
        other => Err(unexpected(path, "a timestamp", other)),
    }
}

fn seconds_to_datetime(secs: &str, path: &Path) -> Result<OffsetDateTime, SchemaError> {
    let secs: i64 = secs
        .parse()
        .map_err(|_| malformed(path, format!("timestamp '{}' outside representable range", secs)))?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|_| malformed(path, format!("timestamp {} outside representable range", secs)))
}

// Normalizes to UTC: one instant has exactly one canonical text, no
// matter what offset the input carried.
fn format_rfc3339(dt: &OffsetDateTime, path: &Path) -> Result<String, SchemaError> {
    dt.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|e| malformed(path, format!("timestamp formatting failed: {}", e)))
}

// ── Canonical ordering ───────────────────────────────────────────────

fn element_prim(token: &Token) -> Prim {
    match &token.kind {
        TokenKind::Int => Prim::Int,
        TokenKind::Nat => Prim::Nat,
        TokenKind::Mutez => Prim::Mutez,
        TokenKind::String => Prim::String,
        TokenKind::Bytes => Prim::Bytes,
        TokenKind::Bool => Prim::Bool,
        TokenKind::Timestamp => Prim::Timestamp,
        TokenKind::Address => Prim::Address,
        TokenKind::Key => Prim::Key,
        TokenKind::KeyHash => Prim::KeyHash,
        TokenKind::Signature => Prim::Signature,
        TokenKind::ChainId => Prim::ChainId,
        // Non-comparable kinds are rejected at type parse time.
        _ => Prim::Unit,
    }
}

/// Compare two encoded key expressions under the canonical order of the
/// key primitive. Encoded forms are canonical, so integer text compares
/// numerically and timestamps (uniform RFC-3339 in UTC) lexicographically.
fn cmp_encoded(prim: Prim, a: &Micheline, b: &Micheline) -> Ordering {
    match (prim, a, b) {
        (Prim::Int | Prim::Nat | Prim::Mutez, Micheline::Int(x), Micheline::Int(y)) => {
            match (BigInt::parse(x), BigInt::parse(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Prim::Bool, Micheline::Prim { prim: x, .. }, Micheline::Prim { prim: y, .. }) => {
            // False < True, which string order happens to give.
            x.cmp(y)
        }
        (_, Micheline::String(x), Micheline::String(y)) => x.cmp(y),
        (_, Micheline::Bytes(x), Micheline::Bytes(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn sort_canonical(
    encoded: &mut [Micheline],
    prim: Prim,
    path: &Path,
) -> Result<(), SchemaError> {
    encoded.sort_by(|a, b| cmp_encoded(prim, a, b));
    for window in encoded.windows(2) {
        if cmp_encoded(prim, &window[0], &window[1]) == Ordering::Equal {
            return Err(SchemaError::DuplicateElement {
                path: path.clone(),
                key: window[0].to_json().to_string(),
            });
        }
    }
    Ok(())
}

fn sort_entries_canonical(
    encoded: &mut [(Micheline, Micheline)],
    prim: Prim,
    path: &Path,
) -> Result<(), SchemaError> {
    encoded.sort_by(|(a, _), (b, _)| cmp_encoded(prim, a, b));
    for window in encoded.windows(2) {
        if cmp_encoded(prim, &window[0].0, &window[1].0) == Ordering::Equal {
            return Err(SchemaError::DuplicateElement {
                path: path.clone(),
                key: window[0].0.to_json().to_string(),
            });
        }
    }
    Ok(())
}
