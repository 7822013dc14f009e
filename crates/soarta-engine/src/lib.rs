#![doc = include_str!("../README.md")]

//! Soar-to-UPPAAL translation engine.
//!
//! This crate orchestrates the full pipeline: parsing, rule analysis,
//! cross-rule matching, identity assignment, template generation, XML
//! export, verifier queries and the sizing report.

pub mod export_xml;
pub mod pipeline;
pub mod queries;
pub mod report;
