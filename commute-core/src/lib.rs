//! Commute Module Engine
//!
//! Platform-agnostic decision engine for the two-stage Commute button puzzle.
//! This crate provides the assignment draw, the rule cascades, and press
//! adjudication without UI or platform-specific dependencies. The
//! presentation layer renders buttons and signals strikes; it feeds live
//! facts in through [`FactSource`] and drives the instance via
//! [`CommutePuzzle::press`].

pub mod assignment;
pub mod constants;
pub mod facts;
pub mod puzzle;
pub mod rules;

// Re-export commonly used types
pub use assignment::{Assignment, AssignmentError, CommuteMethod, METHOD_ORDER};
pub use facts::{
    Edgework, EdgeworkError, FactSource, Indicator, IndicatorState, PORT_ORDER, PortKind,
};
pub use puzzle::{CommutePuzzle, PressOutcome, PuzzleState, Stage};
pub use rules::{
    CascadeVariant, RuleId, STAGE1_ORDER, STAGE2_NORMAL_ORDER, STAGE2_REVERSE_ORDER, Stage1Rule,
    Stage2Rule, Verdict, fallback_slot, stage1_verdict, stage2_verdict,
};
