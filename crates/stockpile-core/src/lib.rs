//! Stockpile Core -- shared data model for the resource planning engine.
//!
//! This crate holds the catalogue (items, crafting formulas, farmable
//! activities, fungible value pools, per-subject progression tables), the
//! progression-state types and rule seam, inventory snapshots, and the task
//! value types shared by the planning crates.
//!
//! # Key Types
//!
//! - [`catalogue::Catalogue`] -- Immutable game-data registry, built once per
//!   session via [`catalogue::CatalogueBuilder`] and shared read-only.
//! - [`progression::ProgressionState`] -- Snapshot of a subject's advancement
//!   (tier, level, keyed sub-tracks), partially ordered per game rules.
//! - [`progression::ProgressionRules`] -- The per-title rule seam
//!   (`normalize`, `is_covered_by`), implemented over catalogue tables by
//!   [`progression::TableRules`].
//! - [`inventory::Inventory`] -- Value-semantics item/quantity map threaded
//!   through resolution.
//! - [`task::Task`] / [`task::Step`] -- One atomic upgrade step with material
//!   costs and prerequisite edges forming a DAG.
//!
//! The engine built on top of this crate is pure and stateless: catalogue in,
//! values out, no internal mutable state surviving a call.

pub mod catalogue;
pub mod id;
pub mod inventory;
pub mod progression;
pub mod task;
