#![doc = include_str!("../README.md")]

//! Soar rule analysis, cross-rule matching and identity assignment.
//!
//! The pipeline is `analysis::analyze` → `matcher::cross_match` →
//! `identity::IdentityTable::assign`; each stage is a pure function of the
//! previous one.

pub mod analysis;
pub mod augmented_tree;
pub mod disjunction;
pub mod identity;
pub mod matcher;
pub mod memory;
pub mod production_vars;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod rule;
pub mod symbol_tree;
pub mod value_count;
