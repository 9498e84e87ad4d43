//! Graph discovery, deduplication, evaluation, and value checks.

mod test_fixtures;

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::prelude::*;
use prensor_exec::{
    calculate_prensors, calculate_values, calculate_values_with_graph, Engine, ExecError,
    ExpressionGraph,
};
use prensor_expr::{CalcContext, Expr, ExprRef, Expression};
use prensor_ops::{create_expression_from_prensor, project, promote};
use test_fixtures::{mk_leaf, mk_prensor, nested, nested_expr, p};

/// Declares an int64 leaf but produces strings.
struct MislabeledExpression;

impl Expression for MislabeledExpression {
    fn kind(&self) -> &'static str {
        "mislabeled"
    }

    fn is_repeated(&self) -> bool {
        false
    }

    fn data_type(&self) -> Option<DataType> {
        Some(DataType::Int64)
    }

    fn sources(&self) -> Vec<ExprRef> {
        Vec::new()
    }

    fn calculate(&self, _ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        Ok(Arc::new(NodeValue::leaf(vec![0], vec!["oops"], false)?))
    }

    fn child(&self, _this: &ExprRef, _step: &Step) -> Option<ExprRef> {
        None
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        BTreeSet::new()
    }
}

#[test]
fn test_calculate_round_trips_a_direct_prensor() {
    let input = nested();
    let out = calculate_prensors(
        &[create_expression_from_prensor(input.clone())],
        &CalcOptions::default(),
        None,
    )
    .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0], input);
}

#[test]
fn test_duplicate_computations_are_merged() {
    let root = nested_expr();
    let once = promote(&root, &p("doc.bar"), "first").unwrap();
    let twice = promote(&once, &p("doc.bar"), "second").unwrap();

    let first = twice.get_descendant_or_error(&p("first")).unwrap();
    let second = twice.get_descendant_or_error(&p("second")).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    let (values, graph) =
        calculate_values_with_graph(&[first, second], &CalcOptions::default(), None).unwrap();
    assert!(Arc::ptr_eq(&values[0], &values[1]));
    assert_eq!(graph.canonical().merged(), 1);
    assert_eq!(graph.canonical().len(), 3);
    assert_eq!(graph.expressions_needed().len(), 3);
    assert_eq!(graph.order_stats().steps, 3);
    assert_eq!(graph.order_stats().max_ready, 2);
}

#[test]
fn test_canonical_graph_is_a_fixed_point() {
    let root = nested_expr();
    let once = promote(&root, &p("doc.bar"), "first").unwrap();
    let twice = promote(&once, &p("doc.bar"), "second").unwrap();
    let first = twice.get_descendant_or_error(&p("first")).unwrap();
    let second = twice.get_descendant_or_error(&p("second")).unwrap();

    let graph = ExpressionGraph::build(&[first, second]).unwrap();
    let again = ExpressionGraph::build(&graph.expressions_needed()).unwrap();
    assert_eq!(again.canonical().merged(), 0);
    assert_eq!(again.canonical().len(), graph.canonical().len());
}

#[test]
fn test_identity_layers_are_not_graph_nodes() {
    let root = nested_expr();
    let projected = project(&root, &[p("user_id")]).unwrap();
    let leaf = projected.get_descendant_or_error(&p("user_id")).unwrap();
    let (values, graph) =
        calculate_values_with_graph(&[leaf], &CalcOptions::default(), None).unwrap();
    assert_eq!(graph.original().len(), 1);
    assert_eq!(
        values[0].as_leaf().unwrap().values,
        Values::from(vec![9i64, 8])
    );
}

#[test]
fn test_rebuilt_children_share_values() {
    let root = nested_expr();
    let a = root.get_descendant_or_error(&p("doc.bar")).unwrap();
    let a_value = calculate_values(&[a], &CalcOptions::default(), None).unwrap();
    let b = root.get_descendant_or_error(&p("doc.bar")).unwrap();
    let b_value = calculate_values(&[b], &CalcOptions::default(), None).unwrap();
    assert!(Arc::ptr_eq(&a_value[0], &b_value[0]));
}

#[test]
fn test_contract_violation_is_reported() {
    let expr = Expr::new(MislabeledExpression);
    let err = calculate_values(&[expr], &CalcOptions::default(), None).unwrap_err();
    match &err {
        ExecError::TypeContract {
            expected, actual, ..
        } => {
            assert_eq!(expected, "optional int64");
            assert_eq!(actual, "optional string");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("returned the wrong type"));
}

#[test]
fn test_ragged_checks_gate_parent_index_validation() {
    let unsorted = mk_prensor(vec![
        ("", NodeValue::root(2)),
        ("x", mk_leaf(vec![1, 0], vec![1i64, 2], true)),
    ]);
    let root = create_expression_from_prensor(unsorted);
    let x = root.get_descendant_or_error(&p("x")).unwrap();

    let strict = calculate_values(&[ExprRef::clone(&x)], &CalcOptions::default(), None);
    assert!(matches!(
        strict,
        Err(ExecError::Core(Error::ShapeMismatch(_)))
    ));

    let lax = Engine::new(CalcOptions::minimal())
        .calculate_values(&[x], None)
        .unwrap();
    assert_eq!(lax[0].size(), 2);
}

#[test]
fn test_engine_defaults_to_full_validation() {
    let engine = Engine::default();
    assert_eq!(engine.options().level(), ValidationLevel::Full);
    let out = engine.calculate_prensors(&[nested_expr()], None).unwrap();
    assert_eq!(out[0].get_descendants().len(), 7);
}

#[test]
fn test_options_from_env() {
    std::env::set_var("PRENSOR_VALIDATION", "minimal");
    std::env::set_var("PRENSOR_SPARSE_CHECKS", "on");
    let options = CalcOptions::from_env();
    std::env::remove_var("PRENSOR_VALIDATION");
    std::env::remove_var("PRENSOR_SPARSE_CHECKS");
    assert!(!options.ragged_checks);
    assert!(options.sparse_checks);

    std::env::set_var("PRENSOR_CALC_OPTIONS", r#"{"ragged_checks":false,"sparse_checks":false}"#);
    std::env::set_var("PRENSOR_RAGGED_CHECKS", "1");
    let options = CalcOptions::try_from_env().unwrap();
    assert!(options.ragged_checks);
    assert!(!options.sparse_checks);

    std::env::set_var("PRENSOR_RAGGED_CHECKS", "sometimes");
    let err = CalcOptions::try_from_env().unwrap_err();
    std::env::remove_var("PRENSOR_CALC_OPTIONS");
    std::env::remove_var("PRENSOR_RAGGED_CHECKS");
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("PRENSOR_RAGGED_CHECKS"));
}
