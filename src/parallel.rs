//! Parallel batch evaluation using Rayon
//!
//! Enable with the `parallel` feature:
//! ```toml
//! symb_opt = { version = "0.1", features = ["parallel"] }
//! ```

use crate::core::error::EvalError;
use crate::core::traits::Scalar;
use crate::function::FunctionParser;
use rayon::prelude::*;

/// Evaluate `parser` at every point in `points` on the Rayon pool.
///
/// Each worker owns one stack machine sized for the parser. Results come back
/// in the order of `points`.
///
/// # Example
/// ```
/// use symb_opt::parallel::eval_batch_parallel;
/// use symb_opt::{Func, FunctionParser, ProgramBuilder};
///
/// let program = ProgramBuilder::new(1)
///     .var(0)
///     .var(0)
///     .op(Func::Mul)
///     .build()
///     .expect("valid program");
/// let parser = FunctionParser::from_program(program).expect("valid program");
/// let points: Vec<[f64; 1]> = (0..4).map(|i| [f64::from(i)]).collect();
///
/// let results = eval_batch_parallel(&parser, &points);
/// assert_eq!(results[3], Ok(9.0));
/// ```
pub fn eval_batch_parallel<T, V>(parser: &FunctionParser<T>, points: &[V]) -> Vec<Result<T, EvalError>>
where
    T: Scalar,
    V: AsRef<[T]> + Sync,
{
    points
        .par_iter()
        .map_init(
            || parser.machine(),
            |machine, vars| machine.run(parser.program(), vars.as_ref()),
        )
        .collect()
}
