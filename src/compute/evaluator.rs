//! The pluggable expression evaluator and its default implementation.

use crate::compute::expr::{parse_expression, BinaryOperator, Expr, UnaryOperator};
use crate::compute::ledger::Scope;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Undefined symbol '{0}'")]
    UnresolvedReference(String),
    #[error("Parse error at position {position}: {message}")]
    Parse { message: String, position: usize },
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    Arity { name: String, expected: &'static str, actual: usize },
    #[error("Invalid argument: {0}")]
    Domain(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Result is not a finite number")]
    NonFinite,
}

impl EvaluationError {
    /// True when the failure comes from a missing scope entry rather than the expression itself.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, EvaluationError::UnresolvedReference(_))
    }
}

/// Evaluates an expression string against the names known so far.
///
/// Implementations must be pure: the same expression and scope always give
/// the same result.
pub trait Evaluator {
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<f64, EvaluationError>;
}

impl<F> Evaluator for F
where
    F: Fn(&str, &Scope) -> Result<f64, EvaluationError>,
{
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<f64, EvaluationError> {
        self(expression, scope)
    }
}

/// The default arithmetic evaluator.
///
/// Non-finite results (e.g. an overflowing power) are reported as errors so
/// they never reach the store or the flow sums.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathEvaluator;

impl MathEvaluator {
    pub fn new() -> Self { Self }

    /// Evaluates an already parsed expression.
    pub fn evaluate_expr(&self, expr: &Expr, scope: &Scope) -> Result<f64, EvaluationError> {
        let value = eval(expr, scope)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvaluationError::NonFinite)
        }
    }
}

impl Evaluator for MathEvaluator {
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<f64, EvaluationError> {
        let expr = parse_expression(expression)
            .map_err(|e| EvaluationError::Parse { message: e.message, position: e.position })?;
        self.evaluate_expr(&expr, scope)
    }
}

/// Names resolved without a scope entry. Scope entries shadow them.
pub const CONSTANTS: [(&str, f64); 4] = [
    ("pi", std::f64::consts::PI),
    ("PI", std::f64::consts::PI),
    ("e", std::f64::consts::E),
    ("E", std::f64::consts::E),
];

pub fn is_constant(name: &str) -> bool {
    CONSTANTS.iter().any(|(c, _)| *c == name)
}

fn constant(name: &str) -> Option<f64> {
    CONSTANTS.iter().find(|(c, _)| *c == name).map(|(_, v)| *v)
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn eval(expr: &Expr, scope: &Scope) -> Result<f64, EvaluationError> {
    match expr {
        Expr::Number(n) => Ok(*n),

        // Scope entries shadow the built-in constants.
        Expr::Name(name) => scope
            .get(name)
            .or_else(|| constant(name))
            .ok_or_else(|| EvaluationError::UnresolvedReference(name.clone())),

        Expr::Unary { op, operand } => {
            let v = eval(operand, scope)?;
            Ok(match op {
                UnaryOperator::Neg => -v,
                UnaryOperator::Plus => v,
            })
        }

        Expr::Binary { op, left, right } => {
            let l = eval(left, scope)?;
            let r = eval(right, scope)?;
            match op {
                BinaryOperator::Add => Ok(l + r),
                BinaryOperator::Sub => Ok(l - r),
                BinaryOperator::Mul => Ok(l * r),
                BinaryOperator::Div => {
                    if r == 0.0 {
                        Err(EvaluationError::DivisionByZero)
                    } else {
                        Ok(l / r)
                    }
                }
                BinaryOperator::Pow => Ok(l.powf(r)),
                BinaryOperator::Lt => Ok(truth(l < r)),
                BinaryOperator::Le => Ok(truth(l <= r)),
                BinaryOperator::Gt => Ok(truth(l > r)),
                BinaryOperator::Ge => Ok(truth(l >= r)),
                BinaryOperator::Eq => Ok(truth(l == r)),
                BinaryOperator::Ne => Ok(truth(l != r)),
            }
        }

        // Only the selected branch is evaluated.
        Expr::Conditional { condition, then, otherwise } => {
            if eval(condition, scope)? != 0.0 {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }

        Expr::Call { name, args } => {
            let values = args.iter().map(|a| eval(a, scope)).collect::<Result<Vec<_>, _>>()?;
            call(name, &values)
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, EvaluationError> {
    let arity = |expected: &'static str| EvaluationError::Arity {
        name: name.to_string(),
        expected,
        actual: args.len(),
    };
    let unary = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(arity("1")),
    };

    match name {
        "abs" => unary(f64::abs),
        "exp" => unary(f64::exp),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "sqrt" => match args {
            [x] if *x < 0.0 => Err(EvaluationError::Domain("sqrt of negative number".into())),
            [x] => Ok(x.sqrt()),
            _ => Err(arity("1")),
        },
        "ln" | "log" | "log10" => {
            let (x, base) = match (name, args) {
                ("log", [x, b]) => (*x, Some(*b)),
                ("log10", [x]) => (*x, Some(10.0)),
                (_, [x]) => (*x, None),
                ("log", _) => return Err(arity("1 or 2")),
                _ => return Err(arity("1")),
            };
            if x <= 0.0 {
                return Err(EvaluationError::Domain(format!("{} of non-positive number", name)));
            }
            match base {
                None => Ok(x.ln()),
                Some(b) if b <= 0.0 || b == 1.0 => Err(EvaluationError::Domain(format!("invalid log base {}", b))),
                Some(b) => Ok(x.log(b)),
            }
        }
        "pow" => match args {
            [a, b] => Ok(a.powf(*b)),
            _ => Err(arity("2")),
        },
        "round" => match args {
            [x] => Ok(x.round()),
            [x, digits] => {
                let factor = 10f64.powi(*digits as i32);
                Ok((x * factor).round() / factor)
            }
            _ => Err(arity("1 or 2")),
        },
        "min" | "max" | "sum" => {
            if args.is_empty() {
                return Err(arity("at least 1"));
            }
            Ok(match name {
                "min" => args.iter().copied().fold(f64::INFINITY, f64::min),
                "max" => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                _ => args.iter().sum(),
            })
        }
        _ => Err(EvaluationError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scope() -> Scope {
        [("rain_input", 10.0), ("rate", 0.25), ("e", 2.0)].into_iter().collect()
    }

    #[rstest]
    #[case("rain_input * 0.5", 5.0)]
    #[case("(rain_input + 2) * rate", 3.0)]
    #[case("2 ^ 3 ^ 2", 512.0)]
    #[case("-2 ^ 2", -4.0)]
    #[case("max(1, rain_input, 3)", 10.0)]
    #[case("min(4, 2)", 2.0)]
    #[case("sum(1, 2, 3.5)", 6.5)]
    #[case("rain_input > 5 ? 1 : 2", 1.0)]
    #[case("rain_input == 10", 1.0)]
    #[case("round(2.346, 2)", 2.35)]
    #[case("log(100, 10)", 2.0)]
    #[case("sqrt(16) + abs(-1)", 5.0)]
    #[case("e * 2", 4.0)]
    fn test_evaluate(#[case] input: &str, #[case] expected: f64) {
        let v = MathEvaluator.evaluate(input, &scope()).unwrap();
        assert!((v - expected).abs() < 1e-9, "{} = {}, expected {}", input, v, expected);
    }

    #[test]
    fn test_constants_without_shadowing() {
        let v = MathEvaluator.evaluate("pi", &Scope::new()).unwrap();
        assert!((v - std::f64::consts::PI).abs() < 1e-12);
    }

    #[rstest]
    #[case("missing + 1", EvaluationError::UnresolvedReference("missing".into()))]
    #[case("1 / (rate - 0.25)", EvaluationError::DivisionByZero)]
    #[case("sqrt(-1)", EvaluationError::Domain("sqrt of negative number".into()))]
    #[case("frobnicate(1)", EvaluationError::UnknownFunction("frobnicate".into()))]
    #[case("10 ^ 400", EvaluationError::NonFinite)]
    fn test_evaluate_errors(#[case] input: &str, #[case] expected: EvaluationError) {
        assert_eq!(MathEvaluator.evaluate(input, &scope()), Err(expected));
    }

    #[test]
    fn test_parse_failure_is_reported() {
        let err = MathEvaluator.evaluate("1 +", &scope()).unwrap_err();
        assert!(matches!(err, EvaluationError::Parse { .. }));
    }

    #[test]
    fn test_deep_nesting_fails_as_parse_error() {
        let input = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        let err = MathEvaluator.evaluate(&input, &scope()).unwrap_err();
        assert!(matches!(err, EvaluationError::Parse { .. }));
    }

    #[test]
    fn test_untaken_branch_is_not_evaluated() {
        let v = MathEvaluator.evaluate("rate > 1 ? missing : 7", &scope()).unwrap();
        assert_eq!(v, 7.0);
    }

    #[test]
    fn test_closure_evaluator() {
        let stub = |expr: &str, _: &Scope| -> Result<f64, EvaluationError> { Ok(expr.len() as f64) };
        assert_eq!(stub.evaluate("abc", &Scope::new()), Ok(3.0));
    }
}
