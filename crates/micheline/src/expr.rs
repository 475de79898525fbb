//! The Micheline expression tree and its JSON wire mapping.

use crate::error::MichelineError;
use serde_json::{json, Value as Json};

/// One Micheline expression node.
///
/// This is the exact shape the node serves and accepts; there is no
/// freedom to reshape it. `Int` keeps the decimal text rather than a
/// machine integer because on-chain naturals and integers are unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Micheline {
    /// `{"int": "-?digits"}`
    Int(String),
    /// `{"string": ..}`
    String(String),
    /// `{"bytes": "hex"}`, held decoded.
    Bytes(Vec<u8>),
    /// `{"prim": .., "args": [..], "annots": [..]}`
    Prim {
        prim: String,
        args: Vec<Micheline>,
        annots: Vec<String>,
    },
    /// A JSON array of expressions.
    Seq(Vec<Micheline>),
}

impl Micheline {
    /// Convenience constructor for a bare primitive with no args or annots.
    pub fn prim(name: &str) -> Micheline {
        Micheline::Prim {
            prim: name.to_string(),
            args: Vec::new(),
            annots: Vec::new(),
        }
    }

    /// Convenience constructor for a primitive application.
    pub fn prim_with(name: &str, args: Vec<Micheline>) -> Micheline {
        Micheline::Prim {
            prim: name.to_string(),
            args,
            annots: Vec::new(),
        }
    }

    /// Parse a wire JSON node into a Micheline expression.
    pub fn from_json(v: &Json) -> Result<Micheline, MichelineError> {
        match v {
            Json::Array(items) => {
                let mut seq = Vec::with_capacity(items.len());
                for item in items {
                    seq.push(Micheline::from_json(item)?);
                }
                Ok(Micheline::Seq(seq))
            }
            Json::Object(obj) => {
                if let Some(i) = obj.get("int") {
                    let text = i.as_str().ok_or_else(|| {
                        MichelineError::InvalidInt(i.to_string())
                    })?;
                    check_int_literal(text)?;
                    return Ok(Micheline::Int(text.to_string()));
                }
                if let Some(s) = obj.get("string") {
                    let text = s.as_str().ok_or_else(|| {
                        MichelineError::Malformed(format!("non-string 'string' payload: {}", s))
                    })?;
                    return Ok(Micheline::String(text.to_string()));
                }
                if let Some(b) = obj.get("bytes") {
                    let text = b.as_str().ok_or_else(|| {
                        MichelineError::InvalidBytes(b.to_string())
                    })?;
                    let bytes = hex::decode(text)
                        .map_err(|_| MichelineError::InvalidBytes(text.to_string()))?;
                    return Ok(Micheline::Bytes(bytes));
                }
                if let Some(p) = obj.get("prim") {
                    let prim = p.as_str().ok_or_else(|| {
                        MichelineError::Malformed(format!("non-string 'prim': {}", p))
                    })?;
                    let mut args = Vec::new();
                    if let Some(raw_args) = obj.get("args") {
                        let arr = raw_args.as_array().ok_or_else(|| {
                            MichelineError::Malformed(format!(
                                "'args' of '{}' is not an array",
                                prim
                            ))
                        })?;
                        for a in arr {
                            args.push(Micheline::from_json(a)?);
                        }
                    }
                    let mut annots = Vec::new();
                    if let Some(raw_annots) = obj.get("annots") {
                        let arr = raw_annots.as_array().ok_or_else(|| {
                            MichelineError::Malformed(format!(
                                "'annots' of '{}' is not an array",
                                prim
                            ))
                        })?;
                        for a in arr {
                            let s = a.as_str().ok_or_else(|| {
                                MichelineError::Malformed(format!("non-string annot: {}", a))
                            })?;
                            annots.push(s.to_string());
                        }
                    }
                    return Ok(Micheline::Prim {
                        prim: prim.to_string(),
                        args,
                        annots,
                    });
                }
                Err(MichelineError::Malformed(format!(
                    "object without int/string/bytes/prim: {}",
                    Json::Object(obj.clone())
                )))
            }
            other => Err(MichelineError::Malformed(other.to_string())),
        }
    }

    /// Produce the wire JSON for this expression. Empty `args`/`annots`
    /// are omitted, matching what the node itself emits.
    pub fn to_json(&self) -> Json {
        match self {
            Micheline::Int(i) => json!({ "int": i }),
            Micheline::String(s) => json!({ "string": s }),
            Micheline::Bytes(b) => json!({ "bytes": hex::encode(b) }),
            Micheline::Prim { prim, args, annots } => {
                let mut obj = serde_json::Map::new();
                obj.insert("prim".to_string(), json!(prim));
                if !args.is_empty() {
                    let rendered: Vec<Json> = args.iter().map(Micheline::to_json).collect();
                    obj.insert("args".to_string(), Json::Array(rendered));
                }
                if !annots.is_empty() {
                    obj.insert("annots".to_string(), json!(annots));
                }
                Json::Object(obj)
            }
            Micheline::Seq(items) => {
                Json::Array(items.iter().map(Micheline::to_json).collect())
            }
        }
    }
}

fn check_int_literal(text: &str) -> Result<(), MichelineError> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MichelineError::InvalidInt(text.to_string()));
    }
    Ok(())
}
