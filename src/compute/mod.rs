//! Evaluates the derived variables of the store.
pub mod batch;
pub mod engine;
pub mod evaluator;
pub mod expr;
pub mod ledger;

pub use batch::{run_scenarios, Scenario, ScenarioResult};
pub use engine::{evaluate_all, Engine, EvaluationReport};
pub use evaluator::{is_constant, EvaluationError, Evaluator, MathEvaluator};
pub use expr::{parse_expression, Expr, ParseError};
pub use ledger::{Failure, Ledger, Scope};
