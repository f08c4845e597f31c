#![doc = "voucher-sheet-core: core logic library for voucher-sheet."]

//! This crate holds the domain logic of voucher-sheet: grid layout, sheet assembly
//! into PDF, the render buffer and its readiness barrier, authenticated export
//! retrieval and artifact persistence. The CLI crate only parses arguments and
//! configuration and calls into here.
//!
//! # Usage
//! Build a sheet with [`assemble::ArtifactBuilder`], fetch a server export with
//! [`export::ExportDispatcher`], and write either result with
//! [`persist::save_artifact`].

pub mod assemble;
pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod layout;
pub mod pdf;
pub mod persist;
pub mod render;
