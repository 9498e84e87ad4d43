//! Path parsing, ordering, and leniency.

use prensor_core::prelude::*;

#[test]
fn test_step_validation_errors() {
    let root = Path::root();
    assert!(matches!(root.child("has space"), Err(Error::PathFormat(_))));
    assert!(matches!(Path::new(["ok", "not ok"]), Err(Error::PathFormat(_))));
    assert!(matches!(create_path("a.b@c"), Err(Error::PathFormat(_))));
}

#[test]
fn test_concat_keeps_leniency() {
    let strict = create_path("a.b").unwrap();
    let lenient = Path::lenient(["c d"]);
    let joined = strict.concat(&lenient);
    assert_eq!(joined.len(), 3);
    assert!(!joined.validate_step_format());
    assert!(strict.concat(&create_path("c").unwrap()).validate_step_format());
}

#[test]
fn test_ordering_is_lexicographic_by_step() {
    let mut paths = vec![
        create_path("b").unwrap(),
        create_path("a.c").unwrap(),
        create_path("a").unwrap(),
        Path::root(),
    ];
    paths.sort();
    let rendered: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    assert_eq!(rendered, vec!["", "a", "a.c", "b"]);
}

#[test]
fn test_anonymous_steps_are_unique() {
    let a = anonymous_step();
    let b = anonymous_step();
    assert_ne!(a, b);
    assert!(a.is_anonymous());
    assert!(Path::root().child(a).is_ok());
}

#[test]
fn test_path_serde_round_trip() {
    let p = create_path("doc.(ext.name).m[k]").unwrap();
    let json = serde_json::to_string(&p).unwrap();
    let back: Path = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
}
