use rowexpr::expression::{
    ExpressionContext, ExpressionError, ExpressionParser, ExpressionResult, ExpressionType,
};
use rowexpr::syntax::{GrammarParser, Node, SourceParser};
use rowexpr::table::{ColumnTable, MacroTable};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Grammar parser counting how often it is asked to parse.
struct CountingParser {
    calls: AtomicUsize,
}

impl SourceParser for CountingParser {
    fn parse(&self, source: &str) -> ExpressionResult<Node> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        GrammarParser.parse(source)
    }
}

fn parser_over(table: ColumnTable) -> ExpressionParser {
    ExpressionParser::builder()
        .with_resolver(Arc::new(table))
        .build()
}

#[test]
fn test_constant_comparison() {
    let parser = ExpressionParser::builder().build();
    let expr = parser.parse("3+4 > 2").unwrap();
    assert_eq!(expr.expression_type(), ExpressionType::Boolean);
    assert!(expr.is_constant());
    assert_eq!(expr.evaluate_boolean().unwrap(), Some(true));
}

#[test]
fn test_missing_over_rows() {
    let parser = parser_over(
        ColumnTable::builder()
            .double_column("x", vec![1.0, f64::NAN, 3.0])
            .build(),
    );
    let expr = parser.parse("missing(x)").unwrap();

    let mut results = Vec::new();
    for row in 0..3 {
        expr.set_index(row);
        results.push(expr.evaluate_boolean().unwrap());
    }
    assert_eq!(results, vec![Some(false), Some(true), Some(false)]);
}

#[test]
fn test_eval_parses_constant_source_once() {
    let counting = Arc::new(CountingParser {
        calls: AtomicUsize::new(0),
    });
    let parser = ExpressionParser::builder()
        .with_source_parser(counting.clone())
        .build();

    let expr = parser
        .build(&Node::call("eval", vec![Node::string("2+2")]))
        .unwrap();
    assert_eq!(expr.expression_type(), ExpressionType::Double);
    for row in 0..5 {
        expr.set_index(row);
        assert_eq!(expr.evaluate_numerical().unwrap(), 4.0);
    }
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lag_over_rows() {
    let parser = parser_over(
        ColumnTable::builder()
            .integer_column("x", vec![10.0, 20.0, 30.0])
            .build(),
    );
    let expr = parser.parse("lag(\"x\", 1)").unwrap();

    let values: Vec<f64> = (0..3)
        .map(|row| {
            expr.set_index(row);
            expr.evaluate_numerical().unwrap()
        })
        .collect();
    assert!(values[0].is_nan());
    assert_eq!(values[1], 10.0);
    assert_eq!(values[2], 20.0);
}

#[test]
fn test_row_number_follows_cursor() {
    let parser = ExpressionParser::builder().build();
    let expr = parser.parse("row_number()").unwrap();
    assert!(!expr.is_constant());
    for row in [0, 1, 2, 9] {
        expr.set_index(row);
        assert_eq!(expr.evaluate_numerical().unwrap(), (row + 1) as f64);
    }
}

#[test]
fn test_mixed_expression_over_table() {
    let table = ColumnTable::builder()
        .string_column(
            "name",
            vec![Some("ada".to_string()), Some("bob".to_string()), None],
        )
        .double_column("score", vec![9.5, 4.0, 7.0])
        .build();
    let macros = Arc::new(MacroTable::new());
    macros.set("suffix", "!");
    let parser = ExpressionParser::builder()
        .with_resolver(Arc::new(table))
        .with_macro_resolver(macros)
        .build();

    let expr = parser
        .parse("if(score >= 5 && !missing(name), concat(upper(name), %{suffix}), \"-\")")
        .unwrap();
    let texts: Vec<Option<String>> = (0..3)
        .map(|row| {
            expr.set_index(row);
            expr.evaluate_nominal().unwrap()
        })
        .collect();
    assert_eq!(
        texts,
        vec![
            Some("ADA!".to_string()),
            Some("-".to_string()),
            Some("-".to_string())
        ]
    );
}

#[test]
fn test_build_time_errors() {
    let parser = ExpressionParser::builder().build();
    assert!(matches!(
        parser.parse("lag(\"x\")"),
        Err(ExpressionError::FunctionArgumentCount { .. })
    ));
    assert!(matches!(
        parser.parse("1 + true"),
        Err(ExpressionError::FunctionInputType { position: 2, .. })
    ));
    assert!(matches!(
        parser.parse("3 +* 4"),
        Err(ExpressionError::Syntax { .. })
    ));
}

#[test]
fn test_cancellation() {
    let stop = Arc::new(AtomicBool::new(false));
    let observed = stop.clone();
    let context = Arc::new(ExpressionContext::with_stop_check(Box::new(move || {
        observed.load(Ordering::SeqCst)
    })));
    let parser = ExpressionParser::builder()
        .with_context(context.clone())
        .build();
    let expr = parser.parse("row_number() * 2").unwrap();
    assert_eq!(expr.evaluate_numerical().unwrap(), 2.0);

    stop.store(true, Ordering::SeqCst);
    assert!(matches!(
        expr.evaluate_numerical(),
        Err(ExpressionError::Cancelled)
    ));
}

#[test]
fn test_expression_moves_to_worker_thread() {
    let parser = parser_over(
        ColumnTable::builder()
            .double_column("x", vec![1.0, 2.0, 3.0, 4.0])
            .build(),
    );
    let expr = parser.parse("x ^ 2").unwrap();

    let handle = thread::spawn(move || {
        (0..4)
            .map(|row| {
                expr.set_index(row);
                expr.evaluate_numerical().unwrap()
            })
            .sum::<f64>()
    });
    assert_eq!(handle.join().unwrap(), 30.0);
}
