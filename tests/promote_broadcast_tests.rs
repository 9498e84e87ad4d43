//! Promote, broadcast, and their combination.

mod test_fixtures;

use std::collections::BTreeMap;

use prensor_core::prelude::*;
use prensor_exec::calculate_prensors;
use prensor_expr::ExprRef;
use prensor_ops::{
    broadcast, broadcast_anonymous, create_expression_from_prensor, promote, promote_and_broadcast,
    promote_anonymous, size, ExprExt,
};
use test_fixtures::{eval, eval_leaf, mk_child, mk_leaf, mk_prensor, nested_expr, p};

/// ```text
/// { event: { val: 1 } event: { val: 2 val: 3 } user_id: 9 }
/// { event: { val: 4 } user_id: 8 }
/// ```
fn events() -> ExprRef {
    create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(2)),
        ("event", mk_child(vec![0, 0, 1], true)),
        ("event.val", mk_leaf(vec![0, 1, 1, 2], vec![1i64, 2, 3, 4], true)),
        ("user_id", mk_leaf(vec![0, 1], vec![9i64, 8], false)),
    ]))
}

#[test]
fn test_promote_leaf() {
    let root = promote(&events(), &p("event.val"), "val").unwrap();
    let val = eval_leaf(&root, &p("val"));
    assert_eq!(val.parent_index, vec![0, 0, 0, 1]);
    assert_eq!(val.values, Values::from(vec![1i64, 2, 3, 4]));
    assert!(val.is_repeated);

    let root = size(&root, &p("val"), "val_count").unwrap();
    let counts = eval_leaf(&root, &p("val_count"));
    assert_eq!(counts.values, Values::from(vec![3i64, 1]));
}

#[test]
fn test_promote_optional_through_optional_stays_optional() {
    let root = create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(3)),
        ("a", mk_child(vec![0, 2], false)),
        ("a.b", mk_leaf(vec![1], vec![true], false)),
    ]));
    let (root, path) = promote_anonymous(&root, &p("a.b")).unwrap();
    let expr = root.get_descendant_or_error(&path).unwrap();
    assert!(!expr.is_repeated());
    let b = eval_leaf(&root, &path);
    assert_eq!(b.parent_index, vec![2]);
}

#[test]
fn test_promote_subtree_keeps_its_children() {
    let root = nested_expr().promote(&p("doc.bar"), "bars").unwrap();
    assert!(root.get_descendant(&p("bars")).is_some());

    let source = create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(1)),
        ("a", mk_child(vec![0, 0], true)),
        ("a.b", mk_child(vec![0, 1, 1], true)),
        ("a.b.c", mk_leaf(vec![0, 1, 2], vec![10i64, 20, 30], false)),
    ]));
    let root = promote(&source, &p("a.b"), "b").unwrap();
    let b = eval(&root, &p("b"));
    assert_eq!(b.parent_index().unwrap(), &[0, 0, 0]);
    let c = eval_leaf(&root, &p("b.c"));
    assert_eq!(c.parent_index, vec![0, 1, 2]);
    assert_eq!(c.values, Values::from(vec![10i64, 20, 30]));
}

#[test]
fn test_promote_rejects_top_level_fields() {
    let err = promote(&events(), &p("user_id"), "x").unwrap_err();
    assert!(err.to_string().contains("beyond the root"));
}

#[test]
fn test_broadcast_leaf_onto_sibling() {
    let root = broadcast(&events(), &p("user_id"), "event", "user_id").unwrap();
    let copied = eval_leaf(&root, &p("event.user_id"));
    assert_eq!(copied.parent_index, vec![0, 1, 2]);
    assert_eq!(copied.values, Values::from(vec![9i64, 9, 8]));
    assert!(!copied.is_repeated);
}

#[test]
fn test_broadcast_requires_a_non_leaf_sibling() {
    let err = broadcast(&events(), &p("event"), "user_id", "x").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_broadcast_subtree() {
    // Copy every `user` (with its friends) onto every `doc` of the same record.
    let (root, path) = broadcast_anonymous(&nested_expr(), &p("user"), "doc").unwrap();
    let users = eval(&root, &path);
    assert_eq!(users.parent_index().unwrap(), &[0, 1, 1, 2, 2]);

    let friends = eval_leaf(&root, &path.child("friends").unwrap());
    assert_eq!(friends.parent_index, vec![0, 1, 1, 2, 3, 3, 4]);
    assert_eq!(
        friends.values,
        Values::from(vec!["a", "b", "c", "d", "b", "c", "d"])
    );
}

#[test]
fn test_promote_and_broadcast_moves_fields() {
    let root = nested_expr();
    let moved = promote_and_broadcast(
        &root,
        &BTreeMap::from([
            (Step::from("uid"), p("user_id")),
            (Step::from("friends"), p("user.friends")),
        ]),
        &p("doc"),
    )
    .unwrap();

    let uid = eval_leaf(&moved, &p("doc.uid"));
    assert_eq!(uid.parent_index, vec![0, 1, 2]);
    assert_eq!(uid.values, Values::from(vec![9i64, 8, 8]));

    let friends = eval_leaf(&moved, &p("doc.friends"));
    assert_eq!(friends.parent_index, vec![0, 1, 1, 1, 2, 2, 2]);
    assert_eq!(
        friends.values,
        Values::from(vec!["a", "b", "c", "d", "b", "c", "d"])
    );

    // Only the requested fields are added; the helpers stay hidden.
    let doc = moved.get_descendant_or_error(&p("doc")).unwrap();
    assert_eq!(doc.known_field_names().len(), 4);
}

#[test]
fn test_transformed_tree_is_valid() {
    let root = nested_expr()
        .promote(&p("user.friends"), "all_friends")
        .unwrap()
        .broadcast(&p("user_id"), "doc", "uid")
        .unwrap();
    let out = calculate_prensors(&[root], &CalcOptions::default(), None).unwrap();
    out[0].validate(&CalcOptions::default()).unwrap();
    assert!(out[0].get_descendant(&p("all_friends")).is_some());
    assert!(out[0].get_descendant(&p("doc.uid")).is_some());
}

#[test]
fn test_promote_preserves_counts_per_grandparent() {
    let root = nested_expr();
    let per_doc = eval_leaf(&size(&root, &p("doc.bar"), "n").unwrap(), &p("doc.n"));
    assert_eq!(per_doc.values, Values::from(vec![1i64, 2, 1]));

    let promoted = promote(&root, &p("doc.bar"), "bars").unwrap();
    let projected = prensor_ops::project(&promoted, &[p("bars")]).unwrap();
    let counts = eval_leaf(&size(&projected, &p("bars"), "n").unwrap(), &p("n"));
    assert_eq!(counts.values, Values::from(vec![1i64, 3]));
}
