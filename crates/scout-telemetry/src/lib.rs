// SPDX-License-Identifier: MIT OR Apache-2.0
//! scout-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Process-level telemetry for Scout APM (spec §4.H): a periodic
//! [`StatsTicker`] that samples process RSS/CPU and reports them to the
//! core agent as `ApplicationEvent`s.

pub mod ticker;

pub use ticker::{StatsTicker, TelemetrySink, DEFAULT_INTERVAL_MS};
