//! Field sizes, presence, and element positions.

mod test_fixtures;

use prensor_core::prelude::*;
use prensor_ops::{
    create_expression_from_prensor, get_index_from_end, get_positional_index, has, size,
    size_anonymous, ExprExt,
};
use test_fixtures::{eval_leaf, mk_leaf, mk_prensor, nested_expr, p};

#[test]
fn test_size_counts_elements_per_parent() {
    let root = create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(3)),
        ("foo", mk_leaf(vec![0, 0, 1], vec![1i64, 2, 3], true)),
    ]));
    let root = size(&root, &p("foo"), "foo_size").unwrap();
    let sizes = eval_leaf(&root, &p("foo_size"));
    assert_eq!(sizes.parent_index, vec![0, 1, 2]);
    assert_eq!(sizes.values, Values::from(vec![2i64, 1, 0]));
    assert!(!sizes.is_repeated);
}

#[test]
fn test_size_of_nested_field() {
    let (root, path) = size_anonymous(&nested_expr(), &p("doc.bar")).unwrap();
    assert_eq!(path.len(), 2);
    let sizes = eval_leaf(&root, &path);
    assert_eq!(sizes.values, Values::from(vec![1i64, 2, 1]));
}

#[test]
fn test_size_of_root_is_an_error() {
    assert!(matches!(
        size(&nested_expr(), &Path::root(), "x"),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_has_marks_present_fields() {
    let root = has(&nested_expr(), &p("doc.keep_me"), "has_keep_me").unwrap();
    let present = eval_leaf(&root, &p("doc.has_keep_me"));
    assert_eq!(present.parent_index, vec![0, 1, 2]);
    assert_eq!(present.values, Values::from(vec![true, true, false]));

    let via_method = nested_expr().has(&p("user_id"), "has_id").unwrap();
    assert_eq!(
        eval_leaf(&via_method, &p("has_id")).values,
        Values::from(vec![true, true])
    );
}

#[test]
fn test_positional_index_and_index_from_end() {
    let root = create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(5)),
        (
            "x",
            mk_leaf(vec![0, 1, 1, 2, 3, 4, 4], vec!["a", "b", "c", "d", "e", "f", "g"], true),
        ),
    ]));

    let (with_pos, pos_path) = get_positional_index(&root, &p("x"), "pos").unwrap();
    let pos = eval_leaf(&with_pos, &pos_path);
    assert_eq!(pos.parent_index, vec![0, 1, 1, 2, 3, 4, 4]);
    assert_eq!(pos.values, Values::from(vec![0i64, 0, 1, 0, 0, 0, 1]));

    let (with_end, end_path) = get_index_from_end(&root, &p("x"), "from_end").unwrap();
    let from_end = eval_leaf(&with_end, &end_path);
    assert_eq!(
        from_end.values,
        Values::from(vec![-1i64, -2, -1, -1, -1, -2, -1])
    );
    // Only the requested field is added.
    assert_eq!(with_end.known_field_names().len(), 2);
}

#[test]
fn test_positional_index_of_a_child() {
    let (root, path) = get_positional_index(&nested_expr(), &p("user"), "user_pos").unwrap();
    let pos = eval_leaf(&root, &path);
    assert_eq!(pos.values, Values::from(vec![0i64, 0, 1]));
    assert!(pos.is_repeated);
}
