//! Heuristic table generation for the Hustle word-guessing solver
//!
//! This crate turns sparse, noisy search statistics into dense lookup tables
//! the solver can use as an admissible heuristic, and expands sampled
//! lower-bound tables onto every answer-list size.
//!
//! # Overview
//!
//! ## Heuristic Table Workflow
//!
//! 1. **Configure** ([`config::PipelineConfig`]): column names, filtering threshold,
//!    anchors, fit strategy, boundary overrides, scaling and output layout.
//!    [`config::Preset`] provides the three standard configurations.
//! 2. **Load Samples** ([`sample::SampleSet`]): read delimited rows, drop
//!    inadmissible outcomes, append anchors
//! 3. **Fit** ([`model::FittedModel`]): one isotonic fit, or one per group
//!    combined by observed weight at each context size
//! 4. **Tabulate** ([`table::LookupTable`]): evaluate every context size,
//!    apply overrides and scaling, write the table
//!
//! [`pipeline::Pipeline`] runs the whole workflow; [`diagnostics::FitDiagnostics`]
//! exposes per-observation residuals for plotting.
//!
//! ## Lower-Bound Expansion
//!
//! [`lbounds::LowerBoundSamples`] reads bounds sampled every `step` sizes and
//! expands them into a [`lbounds::LowerBoundTable`] with one row per size.
//!
//! # Examples
//!
//! ```
//! use hustle_analysis::{config::Preset, pipeline::Pipeline};
//!
//! let pipeline = Pipeline::new(Preset::Grouped.config()).unwrap();
//! let input = "m,n,h,ct\n2,5,1.6,4\n3,5,1.4,2\n3,40,2.5,1\n";
//!
//! let mut table = vec![];
//! let output = pipeline.generate(input.as_bytes(), &mut table).unwrap();
//!
//! let table = String::from_utf8(table).unwrap();
//! assert_eq!(table.lines().next(), Some("0"));
//! assert_eq!(table.lines().count(), output.table.len());
//! ```

pub mod config;
mod delimited;
pub mod diagnostics;
pub mod lbounds;
pub mod model;
pub mod pipeline;
pub mod sample;
pub mod table;

pub use self::delimited::DelimitedError;
