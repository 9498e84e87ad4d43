//! Shared builders for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use prensor_core::prelude::*;
use prensor_exec::calculate_values;
use prensor_expr::ExprRef;
use prensor_ops::create_expression_from_prensor;

pub fn p(s: &str) -> Path {
    create_path(s).expect("valid test path")
}

pub fn mk_child(parent_index: Vec<usize>, is_repeated: bool) -> NodeValue {
    NodeValue::child(parent_index, is_repeated)
}

pub fn mk_leaf(parent_index: Vec<usize>, values: impl Into<Values>, is_repeated: bool) -> NodeValue {
    NodeValue::leaf(parent_index, values, is_repeated).expect("aligned leaf")
}

pub fn mk_prensor(nodes: Vec<(&str, NodeValue)>) -> Prensor {
    build_prensor(nodes.into_iter().map(|(s, n)| (p(s), n))).expect("well-formed prensor")
}

/// Two records:
///
/// ```text
/// { doc: { bar: "a" keep_me: false }  user: { friends: "a" }  user_id: 9 }
/// { doc: { bar: "b" bar: "c" keep_me: true }  doc: { bar: "d" }
///   user: { friends: "b" friends: "c" }  user: { friends: "d" }  user_id: 8 }
/// ```
pub fn nested() -> Prensor {
    mk_prensor(vec![
        ("", NodeValue::root(2)),
        ("doc", mk_child(vec![0, 1, 1], true)),
        ("doc.bar", mk_leaf(vec![0, 1, 1, 2], vec!["a", "b", "c", "d"], true)),
        ("doc.keep_me", mk_leaf(vec![0, 1], vec![false, true], false)),
        ("user", mk_child(vec![0, 1, 1], true)),
        ("user.friends", mk_leaf(vec![0, 1, 1, 2], vec!["a", "b", "c", "d"], true)),
        ("user_id", mk_leaf(vec![0, 1], vec![9i64, 8], false)),
    ])
}

pub fn nested_expr() -> ExprRef {
    create_expression_from_prensor(nested())
}

/// Value of the expression at `path` below `root`, with default options.
pub fn eval(root: &ExprRef, path: &Path) -> Arc<NodeValue> {
    let expr = root.get_descendant_or_error(path).expect("path present");
    calculate_values(&[expr], &CalcOptions::default(), None)
        .expect("calculation succeeds")
        .remove(0)
}

pub fn eval_leaf(root: &ExprRef, path: &Path) -> LeafNode {
    eval(root, path)
        .as_leaf()
        .cloned()
        .expect("leaf value")
}
