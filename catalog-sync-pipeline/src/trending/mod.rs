//! Trending classification.
//!
//! View events enqueue a delayed `TrendingJob`; a worker then evaluates the
//! entity against its current persisted counters and writes the flag back.

mod evaluator;

pub use evaluator::{
    Evaluation, Reason, RecomputeReport, TrendingConfig, TrendingEvaluator, TrendingJob,
    TRENDING_QUEUE,
};
