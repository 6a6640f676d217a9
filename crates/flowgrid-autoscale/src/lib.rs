//! flowgrid-autoscale — demand forecasting and closed-loop scaling.
//!
//! A [`LoadPredictor`] smooths periodic observations of the cluster's total
//! load into a forecast; the [`ScaleController`] reads that forecast plus
//! the cluster's synthetic latency estimate and decides whether to grow or
//! shrink the fleet, rate-limited by a cooldown.
//!
//! # Scaling Algorithm
//!
//! ```text
//! forecast = EMA of total load (alpha-weighted toward recent samples)
//! latency  = 100 + 300 * avg(used/capacity)    (synthetic units)
//! need     = ceil((forecast - 1.5 * nodes) / 2)
//!
//! if latency > target or need > 0:
//!     add max(need, 1) nodes        (clamped at the ceiling)
//! else if latency < 0.6 * target and nodes > floor:
//!     remove one node
//! else:
//!     hold
//! ```
//!
//! Each node is assumed to absorb 1.5 units of forecast load comfortably;
//! every additional node buys 2 units of absorption. The cooldown keeps
//! consecutive actions at least `cooldown` apart to prevent thrashing.

pub mod controller;
pub mod predictor;

pub use controller::{ScaleController, ScaleDecision, ScalePolicy};
pub use predictor::LoadPredictor;
