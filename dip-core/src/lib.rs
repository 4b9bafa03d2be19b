#![doc = "dip-core: core logic library for dip-ui."]

//! This crate holds the deposit information package (DIP) lifecycle: the
//! on-disk package model, the file and attribute stores that mutate it, the
//! packager that turns it into a zip archive, and the deposit client and
//! status tracker that submit the archive to a SWORD collection and remember
//! the outcome.
//!
//! # Usage
//! The `dip` binary in the root crate is a thin shell over these modules.
//! Everything here returns [`error::DipError`], whose status code becomes
//! the process exit status.

pub mod attributes;
pub mod contract;
pub mod deposit;
pub mod error;
pub mod manifest;
pub mod package;
pub mod packager;
pub mod receipt;
pub mod registry;
pub mod status;
pub mod submission;
pub mod sword;

pub use error::{DipError, DipResult};
