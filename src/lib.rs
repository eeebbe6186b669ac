#![forbid(unsafe_code)]

//! Financial Fusion Engine (ffe) — multi-strategy decision fusion for
//! financial tactical intelligence.
//!
//! Three independent fusion strategies behind one contract:
//! 1. **Weighted averaging** — linear risk/profitability scoring with
//!    dynamic weight adjustment under critical weak signals
//! 2. **Dempster-Shafer** — evidence-theoretic combination with explicit
//!    ignorance, belief/plausibility intervals, and conflict detection
//! 3. **Bayesian** — sequential posterior updating over scenario hypotheses
//!
//! A meta-fusion layer combines the three via weighted voting and surfaces
//! their agreement level; the decision assembler turns the consensus into a
//! prioritized, explainable [`engine::FusedDecision`].
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use financial_fusion_engine::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use financial_fusion_engine::core::config::Config;
//! use financial_fusion_engine::engine::SynthesisEngine;
//! ```

pub mod prelude;

pub mod core;
pub mod detector;
pub mod engine;
pub mod fusion;
pub mod logger;
pub mod model;
