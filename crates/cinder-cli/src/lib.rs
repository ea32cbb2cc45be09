// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Library surface of the Cinder command-line driver.
//!
//! The binary lives in `main.rs`; everything testable is here.

pub mod diagnostic;
pub mod driver;
pub mod toolchain;
