// SPDX-License-Identifier: MIT OR Apache-2.0
//! scout-context
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The ambient `{request, span}` frame carried across suspension points
//! (spec §4.F): a `tokio::task_local!`-backed carrier, plus the synchronous
//! fallback fields used by `*Sync` entry points.

pub mod frame;
pub mod request;
pub mod span;
pub mod sync_fallback;

pub use frame::{bind, current_frame, get_request, get_span, run_in_new_frame, set_request, set_span, Frame};
pub use request::Request;
pub use span::Span;
pub use sync_fallback::{
    set_sync_current_request, set_sync_current_span, sync_current_request, sync_current_span,
};
