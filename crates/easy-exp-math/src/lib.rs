//! easy-exp-math: MATH-style benchmark on top of easy-exp-core
//!
//! A [`ProblemModel`] asks an LLM for a `\boxed{}` answer, a
//! [`ProblemMetric`] has a second LLM judge it against the reference
//! solution, and [`MathStep`] ties the two together for the run controller.

pub mod answer;
pub mod dataset;
pub mod metric;
pub mod model;
pub mod step;

pub use answer::{extract_code, get_answer, last_boxed_only_string, remove_boxed, CodeBlock};
pub use dataset::{DatasetError, JsonDataset, MathProblem};
pub use metric::{Attempt, ProblemMetric, DEFAULT_JUDGE_MODEL};
pub use model::{Prediction, ProblemModel, DEFAULT_SOLVER_MODEL};
pub use step::{verdict_log_path, MathStep};
