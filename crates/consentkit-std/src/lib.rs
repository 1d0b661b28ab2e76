// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # consentkit-std
//!
//! `std`-only data adapters for `consentkit-core`.
//!
//! This crate provides [`FileAdapter`], a JSON file-backed implementation of
//! the consent and policy adapter traits suitable for CLI tools, local
//! services and single-process deployments that do not need a full database.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use consentkit_core::{config::Config, services::ConsentServices};
//! use consentkit_std::FileAdapter;
//!
//! let adapter = FileAdapter::open("/var/lib/consentkit/store.json")
//!     .expect("failed to open store file");
//!
//! let services = ConsentServices::new(adapter, Config::default());
//! ```

pub mod adapter;

pub use adapter::file::FileAdapter;
