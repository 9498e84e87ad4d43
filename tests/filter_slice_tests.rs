//! Filtering by masks, slicing, and truncation.

mod test_fixtures;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use prensor_core::prelude::*;
use prensor_exec::{calculate_values, ExecError};
use prensor_expr::ExprRef;
use prensor_ops::{
    create_expression_from_prensor, filter_by_child, filter_by_sibling, slice_expression, truncate,
    Threshold,
};
use test_fixtures::{eval, eval_leaf, mk_child, mk_leaf, mk_prensor, nested_expr, p};

/// `foo` holds `[5, 6]` in the first record and `[7]` in the second.
fn foo() -> ExprRef {
    create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(2)),
        ("foo", mk_leaf(vec![0, 0, 1], vec![5i64, 6, 7], true)),
    ]))
}

fn with_mask(mask_parent_index: Vec<usize>) -> ExprRef {
    create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(2)),
        ("x", mk_leaf(vec![0, 0, 1], vec![1i64, 2, 3], true)),
        ("m", mk_leaf(mask_parent_index, vec![true, false, true], true)),
    ]))
}

#[test]
fn test_filter_by_sibling_keeps_true_elements() {
    let root = filter_by_sibling(&with_mask(vec![0, 0, 1]), &p("x"), "m", "x_kept").unwrap();
    let kept = eval_leaf(&root, &p("x_kept"));
    assert_eq!(kept.parent_index, vec![0, 1]);
    assert_eq!(kept.values, Values::from(vec![1i64, 3]));
}

#[test]
fn test_filter_by_sibling_checks_shapes_when_asked() {
    let root = filter_by_sibling(&with_mask(vec![0, 1, 1]), &p("x"), "m", "x_kept").unwrap();
    let kept = root.get_descendant_or_error(&p("x_kept")).unwrap();

    let err = calculate_values(&[ExprRef::clone(&kept)], &CalcOptions::default(), None).unwrap_err();
    assert!(matches!(err, ExecError::Core(Error::ShapeMismatch(_))));

    assert!(calculate_values(&[kept], &CalcOptions::minimal(), None).is_ok());
}

#[test]
fn test_filter_by_sibling_needs_a_bool_mask() {
    let err = filter_by_sibling(&foo(), &p("foo"), "foo", "bad").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_filter_by_child_filters_the_subtree() {
    let root = filter_by_child(&nested_expr(), &p("doc"), "keep_me", "kept_doc").unwrap();

    let doc = eval(&root, &p("kept_doc"));
    assert_eq!(doc.parent_index().unwrap(), &[1]);
    assert_eq!(doc.indices_to_keep().unwrap(), &[1]);

    let bar = eval_leaf(&root, &p("kept_doc.bar"));
    assert_eq!(bar.parent_index, vec![0, 0]);
    assert_eq!(bar.values, Values::from(vec!["b", "c"]));

    let keep_me = eval_leaf(&root, &p("kept_doc.keep_me"));
    assert_eq!(keep_me.parent_index, vec![0]);
    assert_eq!(keep_me.values, Values::from(vec![true]));
}

#[test]
fn test_filter_by_child_requires_an_optional_bool() {
    let root = nested_expr();
    assert!(filter_by_child(&root, &p("doc"), "bar", "x").is_err());

    let repeated_flags = create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(1)),
        ("a", mk_child(vec![0], false)),
        ("a.flags", mk_leaf(vec![0, 0], vec![true, false], true)),
    ]));
    let err = filter_by_child(&repeated_flags, &p("a"), "flags", "x").unwrap_err();
    assert!(err.to_string().contains("must not be repeated"));
}

#[test]
fn test_slice_from_begin() {
    let root = slice_expression(&foo(), &p("foo"), "tail", Some(Threshold::Fixed(1)), None).unwrap();
    let tail = eval_leaf(&root, &p("tail"));
    assert_eq!(tail.parent_index, vec![0]);
    assert_eq!(tail.values, Values::from(vec![6i64]));
}

#[test]
fn test_slice_with_negative_begin_takes_the_last_elements() {
    let root = slice_expression(&foo(), &p("foo"), "last", Some(Threshold::Fixed(-1)), None).unwrap();
    let last = eval_leaf(&root, &p("last"));
    assert_eq!(last.parent_index, vec![0, 1]);
    assert_eq!(last.values, Values::from(vec![6i64, 7]));
}

#[test]
fn test_slice_with_both_bounds() {
    let root = slice_expression(
        &foo(),
        &p("foo"),
        "all_but_last",
        Some(Threshold::Fixed(0)),
        Some(Threshold::Fixed(-1)),
    )
    .unwrap();
    let out = eval_leaf(&root, &p("all_but_last"));
    assert_eq!(out.parent_index, vec![0]);
    assert_eq!(out.values, Values::from(vec![5i64]));

    // The helper fields used to build the mask are not visible.
    assert_eq!(root.known_field_names().len(), 2);
}

#[test]
fn test_slice_needs_a_bound() {
    let err = slice_expression(&foo(), &p("foo"), "none", None, None).unwrap_err();
    assert!(err.to_string().contains("must specify begin or end"));
}

#[test]
fn test_dynamic_threshold_is_read_at_calculation_time() {
    let begin = Arc::new(AtomicI64::new(1));
    let reader = Arc::clone(&begin);
    let threshold = Threshold::dynamic(move || reader.load(Ordering::SeqCst));
    let root = slice_expression(&foo(), &p("foo"), "dyn", Some(threshold), None).unwrap();

    assert_eq!(eval_leaf(&root, &p("dyn")).values, Values::from(vec![6i64]));
    begin.store(-1, Ordering::SeqCst);
    assert_eq!(eval_leaf(&root, &p("dyn")).values, Values::from(vec![6i64, 7]));
}

#[test]
fn test_truncate_subtree() {
    let root = truncate(&nested_expr(), &p("doc"), 1i64, "first_doc").unwrap();
    let doc = eval(&root, &p("first_doc"));
    assert_eq!(doc.parent_index().unwrap(), &[0, 1]);

    let bar = eval_leaf(&root, &p("first_doc.bar"));
    assert_eq!(bar.parent_index, vec![0, 1, 1]);
    assert_eq!(bar.values, Values::from(vec!["a", "b", "c"]));
}

#[test]
fn test_threshold_debug_hides_closures() {
    assert_eq!(format!("{:?}", Threshold::from(3i64)), "Fixed(3)");
    assert_eq!(format!("{:?}", Threshold::dynamic(|| 1)), "Dynamic(..)");
    assert_eq!(Threshold::dynamic(|| -4).value(), -4);
}
