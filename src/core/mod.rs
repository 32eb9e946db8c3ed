//! Framework-agnostic ledger and aggregation logic.
//!
//! Callers supply the authenticated owner id; nothing here trusts an owner taken
//! from request input.

/// Aggregation engine: summaries, breakdowns, trends, balance history, budgets
pub mod aggregate;
/// Alert evaluator built on budget status and recurring bills
pub mod alerts;
/// Ledger store: transaction mutations with atomic balance adjustments
pub mod ledger;
/// Exact decimal money type
pub mod money;
/// Period tokens, date ranges and calendar buckets
pub mod period;
