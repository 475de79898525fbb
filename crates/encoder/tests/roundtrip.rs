//! Encode/decode round-trips across the primitive and composite tokens,
//! plus canonical-ordering and wire-grammar edge cases.

use std::sync::Arc;

use serde_json::json;
use tzkit_encoder::{BigInt, BigMapFetcher, Schema, SchemaError, StaticFetcher, Value};
use tzkit_micheline::Micheline;

fn schema(ty: serde_json::Value) -> Schema {
    Schema::new(&Micheline::from_json(&ty).unwrap()).unwrap()
}

fn fetcher() -> Arc<dyn BigMapFetcher> {
    Arc::new(StaticFetcher::empty())
}

fn roundtrip(s: &Schema, native: &Value) -> Value {
    let encoded = s.encode(native).unwrap();
    s.decode(&encoded, &fetcher()).unwrap()
}

#[test]
fn scalar_round_trips() {
    let cases = vec![
        (json!({ "prim": "unit" }), Value::Unit),
        (json!({ "prim": "bool" }), Value::Bool(true)),
        (json!({ "prim": "bool" }), Value::Bool(false)),
        (json!({ "prim": "int" }), Value::int(-42)),
        (
            json!({ "prim": "int" }),
            Value::Int(BigInt::parse("123456789012345678901234567890").unwrap()),
        ),
        (json!({ "prim": "nat" }), Value::int(0)),
        (json!({ "prim": "mutez" }), Value::int(1_000_000)),
        (json!({ "prim": "string" }), Value::string("hello world")),
        (
            json!({ "prim": "address" }),
            Value::string("tz1faswCTDciRzE4oJ9jn2Vm2dvjeyA9fUzU"),
        ),
        (
            json!({ "prim": "key_hash" }),
            Value::string("tz1Nbv4rmNjCCsZhZEBtPzujsBLgUf9qpnAz"),
        ),
        (
            json!({ "prim": "chain_id" }),
            Value::string("NetXdQprcVkpaWU"),
        ),
        (json!({ "prim": "bytes" }), Value::Bytes(vec![0xca, 0xfe])),
        (
            json!({ "prim": "timestamp" }),
            Value::Timestamp("2019-09-26T10:59:51Z".to_string()),
        ),
    ];
    for (ty, native) in cases {
        let s = schema(ty);
        assert_eq!(roundtrip(&s, &native), native);
    }
}

#[test]
fn int_wire_form_is_decimal_text() {
    let s = schema(json!({ "prim": "nat" }));
    let expr = s
        .encode(&Value::Int(
            BigInt::parse("340282366920938463463374607431768211456").unwrap(),
        ))
        .unwrap();
    assert_eq!(
        expr.to_json(),
        json!({ "int": "340282366920938463463374607431768211456" })
    );
}

#[test]
fn nat_rejects_negative_both_ways() {
    let s = schema(json!({ "prim": "nat" }));
    assert!(matches!(
        s.encode(&Value::int(-1)).unwrap_err(),
        SchemaError::SchemaMismatch { .. }
    ));
    let wire = Micheline::from_json(&json!({ "int": "-1" })).unwrap();
    assert!(matches!(
        s.decode(&wire, &fetcher()).unwrap_err(),
        SchemaError::MalformedValue { .. }
    ));
}

#[test]
fn timestamp_normalizes_seconds_to_rfc3339() {
    let s = schema(json!({ "prim": "timestamp" }));
    let wire = Micheline::from_json(&json!({ "int": "1569495591" })).unwrap();
    let decoded = s.decode(&wire, &fetcher()).unwrap();
    assert_eq!(
        decoded,
        Value::Timestamp("2019-09-26T10:59:51Z".to_string())
    );
    // Re-encoding emits the canonical string form, not the seconds.
    let encoded = s.encode(&decoded).unwrap();
    assert_eq!(encoded.to_json(), json!({ "string": "2019-09-26T10:59:51Z" }));
}

#[test]
fn timestamp_offset_input_normalizes_to_utc() {
    let s = schema(json!({ "prim": "timestamp" }));
    let wire = Micheline::from_json(&json!({ "string": "2019-09-26T12:59:51+02:00" })).unwrap();
    let decoded = s.decode(&wire, &fetcher()).unwrap();
    assert_eq!(
        decoded,
        Value::Timestamp("2019-09-26T10:59:51Z".to_string())
    );

    let encoded = s
        .encode(&Value::Timestamp("2019-09-26T12:59:51+02:00".to_string()))
        .unwrap();
    assert_eq!(encoded.to_json(), json!({ "string": "2019-09-26T10:59:51Z" }));
}

#[test]
fn timestamp_set_orders_by_instant_across_offsets() {
    let s = schema(json!({ "prim": "set", "args": [{ "prim": "timestamp" }] }));
    // 10:00:00+09:00 is 01:00:00Z, the earlier instant.
    let native = Value::List(vec![
        Value::Timestamp("2019-01-01T02:00:00Z".to_string()),
        Value::Timestamp("2019-01-01T10:00:00+09:00".to_string()),
    ]);
    let encoded = s.encode(&native).unwrap();
    assert_eq!(
        encoded.to_json(),
        json!([
            { "string": "2019-01-01T01:00:00Z" },
            { "string": "2019-01-01T02:00:00Z" }
        ])
    );
}

#[test]
fn timestamp_set_rejects_same_instant_in_two_offsets() {
    let s = schema(json!({ "prim": "set", "args": [{ "prim": "timestamp" }] }));
    let err = s
        .encode(&Value::List(vec![
            Value::Timestamp("2019-01-01T01:00:00Z".to_string()),
            Value::Timestamp("2019-01-01T10:00:00+09:00".to_string()),
        ]))
        .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateElement { .. }));
}

#[test]
fn timestamp_map_keys_sort_by_instant() {
    let s = schema(json!({
        "prim": "map",
        "args": [{ "prim": "timestamp" }, { "prim": "nat" }]
    }));
    let native = Value::Map(vec![
        (
            Value::Timestamp("2019-01-01T02:00:00Z".to_string()),
            Value::int(2),
        ),
        (
            Value::Timestamp("2019-01-01T10:00:00+09:00".to_string()),
            Value::int(1),
        ),
    ]);
    let encoded = s.encode(&native).unwrap();
    assert_eq!(
        encoded.to_json(),
        json!([
            { "prim": "Elt", "args": [{ "string": "2019-01-01T01:00:00Z" }, { "int": "1" }] },
            { "prim": "Elt", "args": [{ "string": "2019-01-01T02:00:00Z" }, { "int": "2" }] }
        ])
    );
}

#[test]
fn timestamp_rejects_garbage() {
    let s = schema(json!({ "prim": "timestamp" }));
    assert!(matches!(
        s.encode(&Value::string("not a date")).unwrap_err(),
        SchemaError::MalformedValue { .. }
    ));
}

#[test]
fn option_round_trips_and_stays_distinct() {
    let s = schema(json!({ "prim": "option", "args": [{ "prim": "int" }] }));
    assert_eq!(roundtrip(&s, &Value::None), Value::None);
    let some_zero = Value::Some(Box::new(Value::int(0)));
    assert_eq!(roundtrip(&s, &some_zero), some_zero);
    assert_ne!(roundtrip(&s, &Value::None), some_zero);

    // A bare value encodes as Some.
    let encoded = s.encode(&Value::int(5)).unwrap();
    assert_eq!(
        encoded.to_json(),
        json!({ "prim": "Some", "args": [{ "int": "5" }] })
    );
}

#[test]
fn unit_is_not_option_none() {
    let unit = schema(json!({ "prim": "unit" }));
    let opt = schema(json!({ "prim": "option", "args": [{ "prim": "unit" }] }));
    let unit_val = roundtrip(&unit, &Value::Unit);
    let none_val = roundtrip(&opt, &Value::None);
    assert_ne!(unit_val, none_val);
}

#[test]
fn list_preserves_order() {
    let s = schema(json!({ "prim": "list", "args": [{ "prim": "int" }] }));
    let native = Value::List(vec![Value::int(3), Value::int(1), Value::int(2)]);
    let encoded = s.encode(&native).unwrap();
    assert_eq!(
        encoded.to_json(),
        json!([{ "int": "3" }, { "int": "1" }, { "int": "2" }])
    );
    assert_eq!(s.decode(&encoded, &fetcher()).unwrap(), native);
}

#[test]
fn set_sorts_into_canonical_order() {
    let s = schema(json!({ "prim": "set", "args": [{ "prim": "string" }] }));
    let native = Value::List(vec![
        Value::string("2"),
        Value::string("1"),
        Value::string("3"),
    ]);
    let encoded = s.encode(&native).unwrap();
    assert_eq!(
        encoded.to_json(),
        json!([{ "string": "1" }, { "string": "2" }, { "string": "3" }])
    );
}

#[test]
fn equal_sets_encode_identically_regardless_of_input_order() {
    let s = schema(json!({ "prim": "set", "args": [{ "prim": "nat" }] }));
    let a = Value::List(vec![Value::int(10), Value::int(2), Value::int(33)]);
    let b = Value::List(vec![Value::int(33), Value::int(10), Value::int(2)]);
    assert_eq!(
        s.encode(&a).unwrap().to_json(),
        s.encode(&b).unwrap().to_json()
    );
    // Numeric, not lexicographic: 2 < 10 < 33.
    assert_eq!(
        s.encode(&a).unwrap().to_json(),
        json!([{ "int": "2" }, { "int": "10" }, { "int": "33" }])
    );
}

#[test]
fn set_rejects_duplicates() {
    let s = schema(json!({ "prim": "set", "args": [{ "prim": "nat" }] }));
    let err = s
        .encode(&Value::List(vec![Value::int(1), Value::int(1)]))
        .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateElement { .. }));
}

#[test]
fn map_sorts_keys_and_preserves_decode_order() {
    let s = schema(json!({
        "prim": "map",
        "args": [{ "prim": "string" }, { "prim": "int" }]
    }));
    let native = Value::Map(vec![
        (Value::string("b"), Value::int(2)),
        (Value::string("a"), Value::int(1)),
    ]);
    let encoded = s.encode(&native).unwrap();
    assert_eq!(
        encoded.to_json(),
        json!([
            { "prim": "Elt", "args": [{ "string": "a" }, { "int": "1" }] },
            { "prim": "Elt", "args": [{ "string": "b" }, { "int": "2" }] }
        ])
    );
    let decoded = s.decode(&encoded, &fetcher()).unwrap();
    assert_eq!(
        decoded,
        Value::Map(vec![
            (Value::string("a"), Value::int(1)),
            (Value::string("b"), Value::int(2)),
        ])
    );
}

#[test]
fn map_rejects_duplicate_keys() {
    let s = schema(json!({
        "prim": "map",
        "args": [{ "prim": "nat" }, { "prim": "nat" }]
    }));
    let err = s
        .encode(&Value::Map(vec![
            (Value::int(1), Value::int(10)),
            (Value::int(1), Value::int(20)),
        ]))
        .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateElement { .. }));
}

#[test]
fn or_positional_round_trips() {
    let s = schema(json!({
        "prim": "or",
        "args": [{ "prim": "int" }, { "prim": "string" }]
    }));
    let left = Value::Left(Box::new(Value::int(9)));
    let encoded = s.encode(&left).unwrap();
    assert_eq!(
        encoded.to_json(),
        json!({ "prim": "Left", "args": [{ "int": "9" }] })
    );
    assert_eq!(s.decode(&encoded, &fetcher()).unwrap(), left);

    let right = Value::Right(Box::new(Value::string("x")));
    assert_eq!(roundtrip(&s, &right), right);
}

#[test]
fn lambda_passes_through_unchanged() {
    let s = schema(json!({
        "prim": "lambda",
        "args": [{ "prim": "unit" }, { "prim": "unit" }]
    }));
    let code = Micheline::from_json(&json!([
        { "prim": "DROP" },
        { "prim": "UNIT" }
    ]))
    .unwrap();
    let native = Value::Lambda(code.clone());
    let encoded = s.encode(&native).unwrap();
    assert_eq!(encoded, code);
    assert_eq!(s.decode(&encoded, &fetcher()).unwrap(), native);
}

#[test]
fn lambda_type_may_mention_operation() {
    // `operation` only exists inside lambdas; the codec carries it opaquely.
    let s = Schema::new(
        &Micheline::from_json(&json!({
            "prim": "lambda",
            "args": [
                { "prim": "unit" },
                { "prim": "list", "args": [{ "prim": "operation" }] }
            ]
        }))
        .unwrap(),
    );
    assert!(s.is_ok());
}

#[test]
fn comb_pair_decodes_like_nested() {
    let s = schema(json!({
        "prim": "pair",
        "args": [{ "prim": "int" }, { "prim": "nat" }, { "prim": "string" }]
    }));
    // The wire may carry the n-ary comb form directly.
    let comb = Micheline::from_json(&json!({
        "prim": "Pair",
        "args": [{ "int": "1" }, { "int": "2" }, { "string": "x" }]
    }))
    .unwrap();
    let nested = Micheline::from_json(&json!({
        "prim": "Pair",
        "args": [
            { "int": "1" },
            { "prim": "Pair", "args": [{ "int": "2" }, { "string": "x" }] }
        ]
    }))
    .unwrap();
    assert_eq!(
        s.decode(&comb, &fetcher()).unwrap(),
        s.decode(&nested, &fetcher()).unwrap()
    );
}

#[test]
fn decode_error_reports_offending_path() {
    let s = schema(json!({
        "prim": "pair",
        "args": [
            { "prim": "nat", "annots": ["%balance"] },
            { "prim": "pair", "annots": ["%inner"], "args": [
                { "prim": "nat", "annots": ["%a"] },
                { "prim": "string", "annots": ["%b"] }
            ]}
        ]
    }));
    let bad = Micheline::from_json(&json!({
        "prim": "Pair",
        "args": [
            { "int": "1" },
            { "prim": "Pair", "args": [{ "int": "2" }, { "int": "3" }] }
        ]
    }))
    .unwrap();
    let err = s.decode(&bad, &fetcher()).unwrap_err();
    match err {
        SchemaError::MalformedValue { path, .. } => {
            assert_eq!(path.to_string(), "inner.b");
        }
        other => panic!("expected MalformedValue, got {:?}", other),
    }
}

#[test]
fn encode_makes_no_partial_progress_observable() {
    // A failing encode returns only the error; the input is untouched.
    let s = schema(json!({
        "prim": "list",
        "args": [{ "prim": "nat" }]
    }));
    let native = Value::List(vec![Value::int(1), Value::int(-2)]);
    assert!(s.encode(&native).is_err());
    assert_eq!(
        native,
        Value::List(vec![Value::int(1), Value::int(-2)])
    );
}
