//! Wire-grammar coverage on realistic script fragments.

use serde_json::json;
use tzkit_micheline::{Micheline, MichelineError, Prim, TypeExpr};

#[test]
fn script_fragment_survives_json_round_trip() {
    let raw = json!([
        { "prim": "parameter", "args": [{
            "prim": "or",
            "args": [
                { "prim": "nat", "annots": ["%increment"] },
                { "prim": "unit", "annots": ["%reset"] }
            ]
        }]},
        { "prim": "storage", "args": [{ "prim": "int" }] }
    ]);
    let parsed = Micheline::from_json(&raw).unwrap();
    assert_eq!(parsed.to_json(), raw);
}

#[test]
fn empty_args_and_annots_are_omitted_on_output() {
    let parsed = Micheline::from_json(&json!({ "prim": "unit", "args": [], "annots": [] })).unwrap();
    assert_eq!(parsed.to_json(), json!({ "prim": "unit" }));
}

#[test]
fn bytes_literal_must_be_even_length_hex() {
    let err = Micheline::from_json(&json!({ "bytes": "abc" })).unwrap_err();
    assert!(matches!(err, MichelineError::InvalidBytes(_)));
    let ok = Micheline::from_json(&json!({ "bytes": "deadbeef" })).unwrap();
    assert_eq!(ok, Micheline::Bytes(vec![0xde, 0xad, 0xbe, 0xef]));
}

#[test]
fn uppercase_hex_is_accepted_and_emitted_lowercase() {
    let parsed = Micheline::from_json(&json!({ "bytes": "DEADBEEF" })).unwrap();
    assert_eq!(parsed, Micheline::Bytes(vec![0xde, 0xad, 0xbe, 0xef]));
    assert_eq!(parsed.to_json(), json!({ "bytes": "deadbeef" }));
}

#[test]
fn int_literal_rejects_non_decimal_text() {
    assert!(Micheline::from_json(&json!({ "int": "0x10" })).is_err());
    assert!(Micheline::from_json(&json!({ "int": "" })).is_err());
    assert!(Micheline::from_json(&json!({ "int": "-7" })).is_ok());
}

#[test]
fn type_expr_normalizes_comb_pair() {
    let raw = Micheline::from_json(&json!({
        "prim": "pair",
        "args": [{ "prim": "int" }, { "prim": "nat" }, { "prim": "string" }]
    }))
    .unwrap();
    let ty = TypeExpr::parse(&raw).unwrap();
    assert_eq!(ty.prim, Prim::Pair);
    assert_eq!(ty.args.len(), 2);
    assert_eq!(ty.args[1].prim, Prim::Pair);
    assert_eq!(ty.args[1].args[0].prim, Prim::Nat);
    assert_eq!(ty.args[1].args[1].prim, Prim::String);
}

#[test]
fn type_expr_rejects_unknown_and_non_comparable() {
    let unknown = Micheline::from_json(&json!({ "prim": "operation" })).unwrap();
    assert!(matches!(
        TypeExpr::parse(&unknown).unwrap_err(),
        MichelineError::UnsupportedType { .. }
    ));

    // Set elements must be comparable.
    let bad_set = Micheline::from_json(&json!({
        "prim": "set",
        "args": [{ "prim": "list", "args": [{ "prim": "int" }] }]
    }))
    .unwrap();
    assert!(matches!(
        TypeExpr::parse(&bad_set).unwrap_err(),
        MichelineError::NotComparable { .. }
    ));
}

#[test]
fn type_expr_enforces_arity() {
    let bare_option = Micheline::from_json(&json!({ "prim": "option" })).unwrap();
    assert!(matches!(
        TypeExpr::parse(&bare_option).unwrap_err(),
        MichelineError::WrongArity { .. }
    ));
}
