//! Lineage translation and validation behaviour

use coremodels::{
    Direction, Lens, LensOp, Lineage, NotFoundError, Ordinal, Runtime, RuntimeConfig,
    TranslationError, ViolationKind,
};
use serde_json::{json, Value};

fn v(major: u64, minor: u64) -> Ordinal {
    Ordinal::new(major, minor)
}

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default()).unwrap()
}

fn object_requiring(field: &str) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(field.to_string(), json!({ "type": "string" }));
    json!({
        "type": "object",
        "required": [field],
        "properties": properties,
        "additionalProperties": false
    })
}

fn title_to_name() -> Lineage {
    Lineage::builder("doc")
        .version(v(1, 0), object_requiring("title"))
        .version(v(2, 0), object_requiring("name"))
        .lens(Lens::declarative(v(1, 0), v(2, 0), vec![LensOp::rename("title", "name")]))
        .build(&runtime())
        .unwrap()
}

fn three_hops() -> Lineage {
    Lineage::builder("doc")
        .version(v(1, 0), object_requiring("title"))
        .version(v(2, 0), object_requiring("name"))
        .version(v(3, 0), object_requiring("label"))
        .lens(Lens::declarative(v(1, 0), v(2, 0), vec![LensOp::rename("title", "name")]))
        .lens(Lens::declarative(v(2, 0), v(3, 0), vec![LensOp::rename("name", "label")]))
        .build(&runtime())
        .unwrap()
}

// =============================================================================
// Worked scenarios
// =============================================================================

#[test]
fn test_breaking_rename_translates_both_ways() {
    let lineage = title_to_name();

    let forward = lineage.translate(&json!({ "title": "x" }), v(1, 0), v(2, 0)).unwrap();
    assert_eq!(forward, json!({ "name": "x" }));

    let backward = lineage.translate(&json!({ "name": "x" }), v(2, 0), v(1, 0)).unwrap();
    assert_eq!(backward, json!({ "title": "x" }));
}

#[test]
fn test_validate_against_old_version_cites_missing_field() {
    let lineage = title_to_name();

    let err = lineage.validate(&json!({ "name": "x" }), v(1, 0)).unwrap_err();
    match err {
        coremodels::Error::Validation(e) => {
            assert_eq!(e.ordinal, v(1, 0));
            let missing = e
                .violations
                .iter()
                .find(|violation| violation.kind == ViolationKind::MissingField)
                .expect("a missing-field violation");
            assert_eq!(missing.path, "/title");
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn test_three_version_chain_composes() {
    let lineage = three_hops();
    let input = json!({ "title": "x" });

    let direct = lineage.translate(&input, v(1, 0), v(3, 0)).unwrap();
    let via = lineage
        .translate(&lineage.translate(&input, v(1, 0), v(2, 0)).unwrap(), v(2, 0), v(3, 0))
        .unwrap();
    assert_eq!(direct, via);
}

#[test]
fn test_unknown_version_is_not_found() {
    let lineage = title_to_name();
    assert_eq!(
        lineage.version_at(v(9, 9)).unwrap_err(),
        NotFoundError::Version {
            lineage: "doc".to_string(),
            ordinal: v(9, 9),
        }
    );
    assert!(matches!(
        lineage.validate(&json!({}), v(9, 9)),
        Err(coremodels::Error::NotFound(_))
    ));
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_translation_is_deterministic() {
    let lineage = three_hops();
    let input = json!({ "title": "deterministic" });

    let first = serde_json::to_vec(&lineage.translate(&input, v(1, 0), v(3, 0)).unwrap()).unwrap();
    let second = serde_json::to_vec(&lineage.translate(&input, v(1, 0), v(3, 0)).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_identity_for_every_version() {
    let lineage = three_hops();
    let instances = [
        (v(1, 0), json!({ "title": "a" })),
        (v(2, 0), json!({ "name": "a" })),
        (v(3, 0), json!({ "label": "a" })),
    ];
    for (ordinal, instance) in instances {
        assert_eq!(lineage.translate(&instance, ordinal, ordinal).unwrap(), instance);
    }
}

#[test]
fn test_composability_for_all_ordered_triples() {
    let lineage = three_hops();
    let ordinals: Vec<Ordinal> = lineage.ordinals().collect();
    let start = json!({ "title": "c" });

    for (i, &a) in ordinals.iter().enumerate() {
        let x = lineage.translate(&start, v(1, 0), a).unwrap();
        for (j, &b) in ordinals.iter().enumerate().skip(i) {
            for &c in ordinals.iter().skip(j) {
                let stepwise = lineage
                    .translate(&lineage.translate(&x, a, b).unwrap(), b, c)
                    .unwrap();
                assert_eq!(stepwise, lineage.translate(&x, a, c).unwrap(), "{} -> {} -> {}", a, b, c);
            }
        }
    }
}

#[test]
fn test_lens_outputs_pass_target_validation() {
    let lineage = three_hops();
    let versions = lineage.versions();

    let mut current = json!({ "title": "agree" });
    for pair in versions.windows(2) {
        current = lineage.translate(&current, pair[0].ordinal(), pair[1].ordinal()).unwrap();
        assert!(pair[1].validate(&current).is_ok());
    }
    for pair in versions.windows(2).rev() {
        current = lineage.translate(&current, pair[1].ordinal(), pair[0].ordinal()).unwrap();
        assert!(pair[0].validate(&current).is_ok());
    }
}

#[test]
fn test_fail_fast_stops_at_failing_hop() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let later_hops = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&later_hops);

    let lineage = Lineage::builder("doc")
        .version(v(1, 0), object_requiring("title"))
        .version(v(2, 0), object_requiring("name"))
        .version(v(3, 0), object_requiring("label"))
        .lens(Lens::new(
            v(1, 0),
            v(2, 0),
            |_| Ok(json!({ "wrong": true })),
            |v| Ok(v.clone()),
        ))
        .lens(Lens::new(
            v(2, 0),
            v(3, 0),
            move |v| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(v.clone())
            },
            |v| Ok(v.clone()),
        ))
        .build(&runtime())
        .unwrap();

    let err = lineage.translate(&json!({ "title": "x" }), v(1, 0), v(3, 0)).unwrap_err();
    match &err {
        TranslationError::HopFailed { index, hop, error } => {
            assert_eq!(*index, 0);
            assert_eq!((hop.from, hop.to, hop.direction), (v(1, 0), v(2, 0), Direction::Forward));
            assert!(error.mentions("/name"));
        }
        other => panic!("expected HopFailed, got {:?}", other),
    }
    assert!(err.to_string().contains("1.0 -> 2.0"));
    assert_eq!(later_hops.load(Ordering::SeqCst), 0);
}

#[test]
fn test_concurrent_readers_share_one_lineage() {
    let lineage = three_hops();
    let expected = json!({ "label": "shared" });

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let out = lineage
                        .translate(&json!({ "title": "shared" }), v(1, 0), v(3, 0))
                        .unwrap();
                    assert_eq!(out, expected);
                    assert!(lineage.validate(&out, v(3, 0)).is_ok());
                }
            });
        }
    });
}
