//! The schema: one bound codec per top-level type expression.
//!
//! A `Schema` owns the token tree for a contract's parameter or storage
//! type. Construction walks the full tree exactly once, resolving named
//! access and building the flattened field-name index; after that the
//! schema is immutable and any number of callers may encode and decode
//! through it concurrently.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as Json;

use tzkit_micheline::{Micheline, MichelineError, TypeExpr};

use crate::bigmap::BigMapFetcher;
use crate::error::{Path, SchemaError};
use crate::token::{Access, Token, TokenKind};
use crate::value::Value;

/// Which section of a contract script a schema is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Parameter,
    Storage,
}

impl Section {
    fn keyword(&self) -> &'static str {
        match self {
            Section::Parameter => "parameter",
            Section::Storage => "storage",
        }
    }
}

/// The serializable output of [`Schema::describe`]: the expected native
/// shape plus the flattened field-name index for external validators.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchemaDescription {
    pub shape: Json,
    /// Field name to dotted path from the root.
    pub fields: BTreeMap<String, String>,
}

/// The bound codec for one top-level type expression.
#[derive(Debug, Clone)]
pub struct Schema {
    root: Token,
    index: BTreeMap<String, Path>,
    leaf_paths: Vec<Path>,
}

impl Schema {
    /// Build a schema from a type expression.
    ///
    /// Fails on an unknown primitive, a wrong arity, a non-comparable
    /// key type, or a field-annotation collision; all of these surface
    /// here, before any encode or decode is attempted.
    pub fn new(type_expr: &Micheline) -> Result<Schema, SchemaError> {
        let ty = TypeExpr::parse(type_expr)?;
        let root = Token::build(&ty, &Path::root())?;
        let mut index = BTreeMap::new();
        let mut leaf_paths = Vec::new();
        build_indices(&root, &Path::root(), &mut index, &mut leaf_paths);
        Ok(Schema {
            root,
            index,
            leaf_paths,
        })
    }

    /// Build a schema straight from a contract script (the `Seq` of
    /// `parameter`, `storage` and `code` sections an RPC returns).
    pub fn from_script(script: &Micheline, section: Section) -> Result<Schema, SchemaError> {
        let sections = match script {
            Micheline::Seq(items) => items,
            other => {
                return Err(SchemaError::Type(MichelineError::Malformed(format!(
                    "script must be a sequence of sections, got {}",
                    other.to_json()
                ))))
            }
        };
        for item in sections {
            if let Micheline::Prim { prim, args, .. } = item {
                if prim == section.keyword() {
                    let ty = args.first().ok_or_else(|| {
                        SchemaError::Type(MichelineError::Malformed(format!(
                            "'{}' section has no type argument",
                            prim
                        )))
                    })?;
                    return Schema::new(ty);
                }
            }
        }
        Err(SchemaError::Type(MichelineError::Malformed(format!(
            "script has no '{}' section",
            section.keyword()
        ))))
    }

    /// The root token, for callers composing their own walks.
    pub fn root(&self) -> &Token {
        &self.root
    }

    /// Encode one structured native value.
    pub fn encode(&self, value: &Value) -> Result<Micheline, SchemaError> {
        self.root.encode_object(value, &Path::root())
    }

    /// Encode from an ordered argument list. The list must be consumed
    /// exactly; leftovers are an arity mismatch, as is underrun.
    pub fn encode_args(&self, args: &[Value]) -> Result<Micheline, SchemaError> {
        let mut queue: VecDeque<Value> = args.iter().cloned().collect();
        let expr = self.root.encode_positional(&mut queue, &Path::root())?;
        if !queue.is_empty() {
            return Err(SchemaError::ArityMismatch {
                path: Path::root(),
                expected: args.len() - queue.len(),
                got: args.len(),
            });
        }
        Ok(expr)
    }

    /// Decode a value expression. Big-map pointers become handles bound
    /// to `fetcher`; nothing else touches it.
    pub fn decode(
        &self,
        expr: &Micheline,
        fetcher: &Arc<dyn BigMapFetcher>,
    ) -> Result<Value, SchemaError> {
        self.root.decode(expr, &Path::root(), fetcher)
    }

    /// Describe the expected native shape.
    pub fn describe(&self) -> SchemaDescription {
        SchemaDescription {
            shape: self.root.describe(),
            fields: self
                .index
                .iter()
                .map(|(name, path)| (name.clone(), path.to_string()))
                .collect(),
        }
    }

    /// Resolve a field name against the flattened index. Where the same
    /// name legally appears in several separate groups, the first one in
    /// construction order wins.
    pub fn resolve_path(&self, name: &str) -> Result<&Path, SchemaError> {
        self.index.get(name).ok_or_else(|| SchemaError::UnknownField {
            name: name.to_string(),
        })
    }

    /// Paths to every statically-addressable leaf, in schema order.
    pub fn leaf_paths(&self) -> &[Path] {
        &self.leaf_paths
    }

    /// The annotated entrypoints of a parameter schema: every `%`-named
    /// leaf of the root `or` tree, in declaration order. Empty when the
    /// root is not an `or`.
    pub fn entrypoints(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_entrypoints(&self.root, &mut out);
        out
    }

    /// Encode a call to a named entrypoint: encodes `value` against the
    /// entrypoint's own type and wraps it in the `Left`/`Right` chain
    /// that addresses the branch.
    pub fn encode_call(&self, name: &str, value: &Value) -> Result<Micheline, SchemaError> {
        let mut wraps = Vec::new();
        let token = find_entrypoint(&self.root, name, &mut wraps).ok_or_else(|| {
            SchemaError::UnknownField {
                name: name.to_string(),
            }
        })?;
        let mut expr = token.encode_object(value, &Path::root().field(name))?;
        for wrap in wraps.into_iter().rev() {
            expr = Micheline::prim_with(wrap, vec![expr]);
        }
        Ok(expr)
    }
}

// ── Index construction ───────────────────────────────────────────────

fn build_indices(
    token: &Token,
    path: &Path,
    index: &mut BTreeMap<String, Path>,
    leaf_paths: &mut Vec<Path>,
) {
    match &token.kind {
        TokenKind::Pair { access, .. } | TokenKind::Or { access, .. } => match access {
            Access::Named { .. } => {
                for (name, leaf) in token.group_leaves() {
                    // SAFETY: Named access implies every leaf is annotated
                    let name = name.unwrap();
                    let leaf_path = path.field(name);
                    index.entry(name.to_string()).or_insert_with(|| leaf_path.clone());
                    build_indices(leaf, &leaf_path, index, leaf_paths);
                }
            }
            Access::Positional { .. } => {
                for (i, (_, leaf)) in token.group_leaves().into_iter().enumerate() {
                    build_indices(leaf, &path.index(i), index, leaf_paths);
                }
            }
        },
        // Option wraps its child transparently for addressing purposes.
        TokenKind::Option { inner } => build_indices(inner, path, index, leaf_paths),
        // Containers and scalars terminate static addressing.
        _ => leaf_paths.push(path.clone()),
    }
}

// ── Entrypoint walks ─────────────────────────────────────────────────

fn or_children(token: &Token) -> Option<(&Token, &Token)> {
    match &token.kind {
        TokenKind::Or { left, right, .. } => Some((left, right)),
        _ => None,
    }
}

fn collect_entrypoints<'a>(token: &'a Token, out: &mut Vec<&'a str>) {
    let Some((left, right)) = or_children(token) else {
        return;
    };
    for side in [left, right] {
        if let Some(name) = side.annots.field_name() {
            out.push(name);
        } else {
            collect_entrypoints(side, out);
        }
    }
}

fn find_entrypoint<'a>(
    token: &'a Token,
    name: &str,
    wraps: &mut Vec<&'static str>,
) -> Option<&'a Token> {
    let (left, right) = or_children(token)?;
    for (side, wrap) in [(left, "Left"), (right, "Right")] {
        wraps.push(wrap);
        if side.annots.field_name() == Some(name) {
            return Some(side);
        }
        if side.annots.field.is_none() {
            if let Some(found) = find_entrypoint(side, name, wraps) {
                return Some(found);
            }
        }
        wraps.pop();
    }
    None
}
