//! The parser as a sandbox: what gets through, what is refused, and how
//! refusals are reported.

use tally_core::{parse, CompareOp, Construct, Expr, Literal, ParseError, MAX_DEPTH};

fn refused(src: &str) -> Construct {
    match parse(src) {
        Err(ParseError::Unsafe { construct, .. }) => construct,
        other => panic!("{src:?}: expected an unsafe-construct error, got {other:?}"),
    }
}

fn syntax(src: &str) -> ParseError {
    match parse(src) {
        Err(e @ ParseError::Syntax { .. }) => e,
        other => panic!("{src:?}: expected a syntax error, got {other:?}"),
    }
}

#[test]
fn filters_from_real_section_files_parse() {
    for src in [
        "True",
        "category == \"Bills\" and months >= 6",
        "subcategory == \"Restaurant\" or subcategory == \"Fast Food\" or subcategory == \"Delivery\"",
        "sum(payments) > 1000 and months <= 3",
        "'business' in tags and not ('personal' in tags)",
        "max(sum(by('month'))) / avg(sum(by('month'))) > 3",
        "round(stddev(payments) / avg(payments), 2) < 0.3",
        "1 if count(payments) > 2 else 0",
        "-abs(total) + 5 % 3",
    ] {
        assert!(parse(src).is_ok(), "{src}");
    }
}

#[test]
fn structure_of_a_guarded_filter() {
    let expr = parse("category == 'Travel' and nights > 3").unwrap();
    let Expr::And(left, right) = expr else {
        panic!("expected a conjunction");
    };
    assert_eq!(
        *left,
        Expr::Compare {
            left: Box::new(Expr::Name("category".into())),
            links: vec![(CompareOp::Eq, Expr::Literal(Literal::Str("Travel".into())))],
        }
    );
    assert!(matches!(*right, Expr::Compare { .. }));
}

#[test]
fn every_disallowed_construct_is_refused() {
    assert_eq!(refused("[1, 2]"), Construct::ListLiteral);
    assert_eq!(refused("(1, 2)"), Construct::TupleLiteral);
    assert_eq!(refused("{1, 2}"), Construct::SetLiteral);
    assert_eq!(refused("{'a': 1}"), Construct::DictLiteral);
    assert_eq!(refused("[p for p in payments]"), Construct::Comprehension);
    assert_eq!(refused("lambda x: x"), Construct::Lambda);
    assert_eq!(refused("payments.__class__"), Construct::AttributeAccess);
    assert_eq!(refused("payments[0]"), Construct::Subscript);
}

#[test]
fn refusals_deep_inside_an_expression() {
    assert_eq!(refused("sum(payments) > 1 and tags.pop()"), Construct::AttributeAccess);
    assert_eq!(refused("max(payments[1:])"), Construct::Subscript);
}

#[test]
fn disguised_calls_parse_but_stay_calls() {
    // Rejected later, when the evaluator cannot resolve the name.
    let expr = parse("__import__('os')").unwrap();
    assert!(matches!(expr, Expr::Call { ref function, .. } if function == "__import__"));
}

#[test]
fn malformed_input_is_a_syntax_error() {
    for src in ["", "x = 1", "(1 + 2", "1 +", "2 ** 3", "7 // 2", "'open", "a b"] {
        syntax(src);
    }
}

#[test]
fn errors_point_at_a_column() {
    let e = syntax("payments = 5");
    assert_eq!(e.column(), 10);
    let e = parse("1 + [2]").unwrap_err();
    assert_eq!(e.column(), 5);
    assert!(e.to_string().contains("list literal"));
    assert_eq!(e.to_json_value()["kind"], "unsafe");
}

#[test]
fn runaway_nesting_is_refused_not_overflowed() {
    let n = 10_000;
    for src in [
        format!("{}1{}", "(".repeat(n), ")".repeat(n)),
        format!("{}True", "not ".repeat(n)),
        format!("{}1", "-".repeat(n)),
        format!("{}1{}", "abs(".repeat(n), ")".repeat(n)),
        format!("1{}", " + 1".repeat(n)),
        format!("True{}", " and True".repeat(n)),
    ] {
        let e = syntax(&src);
        assert!(e.to_string().contains("nested too deeply"), "{e}");
    }
}

#[test]
fn reasonable_nesting_still_parses() {
    let depth = MAX_DEPTH / 2;
    let src = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(parse(&src).unwrap(), Expr::Literal(Literal::Number(1.0)));
    assert!(parse(&format!("1{}", " + 1".repeat(depth))).is_ok());
    assert!(parse(&format!("{}True", "not ".repeat(depth))).is_ok());
}
