//! Value maps and subtree maps.

mod test_fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prensor_core::kernels::segment_counts;
use prensor_core::prelude::*;
use prensor_core::{RaggedArray, SparseArray};
use prensor_exec::{calculate_values, ExecError};
use prensor_ops::{
    create_expression_from_prensor, map_many_values, map_prensor, map_prensor_anonymous,
    map_prensor_to_prensor, map_ragged_leaves, map_sparse_leaves, map_values,
    map_values_anonymous,
};
use test_fixtures::{eval_leaf, mk_leaf, mk_prensor, nested_expr, p};

fn upper(values: &Values) -> Result<Values> {
    match values {
        Values::Str(v) => Ok(Values::Str(v.iter().map(|s| s.to_uppercase()).collect())),
        other => Err(Error::InvalidArgument(format!("expected strings, got {}", other.data_type()))),
    }
}

#[test]
fn test_map_values_keeps_shape() {
    let root = map_values(&nested_expr(), &p("doc.bar"), upper, DataType::Utf8, "bar_upper").unwrap();
    let out = eval_leaf(&root, &p("doc.bar_upper"));
    assert_eq!(out.parent_index, vec![0, 1, 1, 2]);
    assert_eq!(out.values, Values::from(vec!["A", "B", "C", "D"]));
    assert!(out.is_repeated);
}

#[test]
fn test_map_values_of_root_fails() {
    let err = map_values_anonymous(&nested_expr(), &Path::root(), upper, DataType::Utf8).unwrap_err();
    assert!(err.to_string().contains("cannot map the root"));
}

#[test]
fn test_map_values_declared_type_is_enforced() {
    let root = map_values(&nested_expr(), &p("doc.bar"), upper, DataType::Int64, "wrong").unwrap();
    let expr = root.get_descendant_or_error(&p("doc.wrong")).unwrap();
    let err = calculate_values(&[expr], &CalcOptions::default(), None).unwrap_err();
    assert!(matches!(err, ExecError::TypeContract { .. }));
}

#[test]
fn test_map_many_values_combines_siblings() {
    let root = create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(2)),
        ("a", mk_leaf(vec![0, 1], vec![1i64, 2], false)),
        ("b", mk_leaf(vec![0, 1], vec![10i64, 20], false)),
    ]));
    let (root, sum_path) = map_many_values(
        &root,
        &Path::root(),
        &[Step::from("a"), Step::from("b")],
        |inputs: &[&Values]| {
            let a = inputs[0].as_i64().unwrap_or_default();
            let b = inputs[1].as_i64().unwrap_or_default();
            Ok(Values::I64(a.iter().zip(b).map(|(x, y)| x + y).collect()))
        },
        DataType::Int64,
        "sum",
    )
    .unwrap();
    let sum = eval_leaf(&root, &sum_path);
    assert_eq!(sum.values, Values::from(vec![11i64, 22]));
}

#[test]
fn test_map_many_values_rejects_mixed_cardinality() {
    let root = create_expression_from_prensor(mk_prensor(vec![
        ("", NodeValue::root(2)),
        ("a", mk_leaf(vec![0, 1], vec![1i64, 2], false)),
        ("b", mk_leaf(vec![0, 1], vec![10i64, 20], true)),
    ]));
    let result = map_many_values(
        &root,
        &Path::root(),
        &[Step::from("a"), Step::from("b")],
        |inputs: &[&Values]| Ok(inputs[0].clone()),
        DataType::Int64,
        "x",
    );
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_map_prensor_sees_the_projected_subtree() {
    let root = map_prensor(
        &nested_expr(),
        &p("doc"),
        &[p("bar")],
        |tree: &Prensor, _options: &CalcOptions| {
            assert_eq!(tree.field_names().len(), 1);
            let docs = tree.node().size();
            let bar = tree.get_descendant_or_error(&create_path("bar")?)?;
            let counts = segment_counts(bar.node().parent_index().unwrap_or(&[]), docs)?;
            LeafNode::new((0..docs).collect(), Values::I64(counts), false)
        },
        false,
        DataType::Int64,
        "bar_count",
    )
    .unwrap();
    let counts = eval_leaf(&root, &p("doc.bar_count"));
    assert_eq!(counts.parent_index, vec![0, 1, 2]);
    assert_eq!(counts.values, Values::from(vec![1i64, 2, 1]));
}

#[test]
fn test_map_prensor_checks_the_result_type() {
    let (root, path) = map_prensor_anonymous(
        &nested_expr(),
        &Path::root(),
        &[p("user_id")],
        |tree: &Prensor, _options: &CalcOptions| {
            Ok(LeafNode::required(Values::Bool(vec![true; tree.node().size()])))
        },
        false,
        DataType::Int64,
    )
    .unwrap();
    let expr = root.get_descendant_or_error(&path).unwrap();
    let err = calculate_values(&[expr], &CalcOptions::default(), None).unwrap_err();
    assert!(err.to_string().contains("type unmatched"));
}

#[test]
fn test_map_ragged_leaves() {
    let root = map_ragged_leaves(
        &nested_expr(),
        &p("doc"),
        &[p("bar")],
        |inputs: &[&RaggedArray]| {
            let bar = inputs[0];
            Ok(RaggedArray {
                partitions: bar.partitions.clone(),
                values: upper(&bar.values)?,
            })
        },
        true,
        DataType::Utf8,
        "bar_upper",
    )
    .unwrap();
    let out = eval_leaf(&root, &p("doc.bar_upper"));
    assert_eq!(out.parent_index, vec![0, 1, 1, 2]);
    assert_eq!(out.values, Values::from(vec!["A", "B", "C", "D"]));
}

#[test]
fn test_map_ragged_leaves_rejects_deeper_results() {
    let root = map_ragged_leaves(
        &nested_expr(),
        &Path::root(),
        &[p("doc.bar")],
        |inputs: &[&RaggedArray]| Ok(inputs[0].clone()),
        true,
        DataType::Utf8,
        "flat",
    )
    .unwrap();
    let expr = root.get_descendant_or_error(&p("flat")).unwrap();
    let err = calculate_values(&[expr], &CalcOptions::default(), None).unwrap_err();
    assert!(err.to_string().contains("ragged rank 1"));
}

#[test]
fn test_map_sparse_leaves() {
    let root = map_sparse_leaves(
        &nested_expr(),
        &p("doc"),
        &[p("bar")],
        |inputs: &[&SparseArray]| {
            let bar = inputs[0];
            assert_eq!(bar.dense_shape, vec![3, 2]);
            Ok(SparseArray {
                indices: bar.indices.clone(),
                dense_shape: bar.dense_shape.clone(),
                values: upper(&bar.values)?,
            })
        },
        true,
        DataType::Utf8,
        "bar_upper",
    )
    .unwrap();
    let out = eval_leaf(&root, &p("doc.bar_upper"));
    assert_eq!(out.parent_index, vec![0, 1, 1, 2]);
    assert_eq!(out.values, Values::from(vec!["A", "B", "C", "D"]));
}

#[test]
fn test_map_sparse_leaves_checks_index_rank() {
    let root = map_sparse_leaves(
        &nested_expr(),
        &p("doc"),
        &[p("bar")],
        |inputs: &[&SparseArray]| {
            let bar = inputs[0];
            Ok(SparseArray {
                indices: bar.indices.iter().map(|ix| vec![ix[0]]).collect(),
                dense_shape: vec![3],
                values: bar.values.clone(),
            })
        },
        true,
        DataType::Utf8,
        "flat",
    )
    .unwrap();
    let expr = root.get_descendant_or_error(&p("doc.flat")).unwrap();
    let err = calculate_values(&[expr.clone()], &CalcOptions::default(), None).unwrap_err();
    assert!(matches!(err, ExecError::Core(Error::ShapeMismatch(_))));

    let lax = calculate_values(&[expr], &CalcOptions::minimal(), None).unwrap();
    assert_eq!(lax[0].parent_index().unwrap(), &[0, 1, 1, 2]);
}

/// Per document: a `summary { count }` message and the bars upper-cased as `tags`.
fn summarize(tree: &Prensor, _options: &CalcOptions) -> Result<Prensor> {
    let docs = tree.node().size();
    let bar = tree.get_child_or_error(&Step::from("bar"))?.node();
    let bar = bar
        .as_leaf()
        .ok_or_else(|| Error::InvalidArgument("bar must be a leaf".to_string()))?;
    let counts = segment_counts(&bar.parent_index, docs)?;
    build_prensor(vec![
        (Path::root(), NodeValue::root(docs)),
        (p("summary"), NodeValue::child((0..docs).collect(), false)),
        (p("summary.count"), NodeValue::leaf((0..docs).collect(), counts, false)?),
        (p("tags"), NodeValue::leaf(bar.parent_index.clone(), upper(&bar.values)?, true)?),
    ])
}

fn summary_schema(tags_repeated: bool) -> Schema {
    Schema::node(true)
        .with_child(
            "summary",
            Schema::node(false).with_child("count", Schema::leaf(false, DataType::Int64)),
        )
        .with_child("tags", Schema::leaf(tags_repeated, DataType::Utf8))
}

#[test]
fn test_map_prensor_to_prensor_adds_a_subtree() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let root = map_prensor_to_prensor(
        &nested_expr(),
        &p("doc"),
        &[p("bar")],
        move |tree: &Prensor, options: &CalcOptions| {
            seen.fetch_add(1, Ordering::SeqCst);
            summarize(tree, options)
        },
        summary_schema(true),
    )
    .unwrap();

    let doc = root.get_descendant_or_error(&p("doc")).unwrap();
    let fields: Vec<String> = doc.known_field_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(fields, vec!["bar", "keep_me", "summary", "tags"]);

    let count = root.get_descendant_or_error(&p("doc.summary.count")).unwrap();
    let tags = root.get_descendant_or_error(&p("doc.tags")).unwrap();
    assert_eq!(count.data_type(), Some(DataType::Int64));
    let values = calculate_values(&[count, tags], &CalcOptions::default(), None).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let count = values[0].as_leaf().unwrap();
    assert_eq!(count.parent_index, vec![0, 1, 2]);
    assert_eq!(count.values, Values::from(vec![1i64, 2, 1]));
    let tags = values[1].as_leaf().unwrap();
    assert_eq!(tags.parent_index, vec![0, 1, 1, 2]);
    assert_eq!(tags.values, Values::from(vec!["A", "B", "C", "D"]));
}

#[test]
fn test_map_prensor_to_prensor_checks_the_schema() {
    let root = map_prensor_to_prensor(
        &nested_expr(),
        &p("doc"),
        &[p("bar")],
        summarize,
        summary_schema(false),
    )
    .unwrap();
    let tags = root.get_descendant_or_error(&p("doc.tags")).unwrap();
    let err = calculate_values(&[tags], &CalcOptions::default(), None).unwrap_err();
    assert!(matches!(err, ExecError::Core(Error::InvalidArgument(_))));
    assert!(err.to_string().contains("schema expects optional string"));

    let missing = Schema::node(true).with_child("absent", Schema::leaf(false, DataType::Int64));
    let root = map_prensor_to_prensor(&nested_expr(), &p("doc"), &[p("bar")], summarize, missing)
        .unwrap();
    let absent = root.get_descendant_or_error(&p("doc.absent")).unwrap();
    assert!(matches!(
        calculate_values(&[absent], &CalcOptions::default(), None),
        Err(ExecError::Core(Error::MissingPath(_)))
    ));

    assert!(map_prensor_to_prensor(&nested_expr(), &p("doc"), &[p("bar")], summarize, Schema::root())
        .is_err());
}
