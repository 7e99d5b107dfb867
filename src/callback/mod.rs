// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Callback store: beacon hits and the injection index
//!
//! Append-only log of out-of-band callbacks plus per-injection metadata,
//! persisted as JSON so other tooling can read the files directly.

mod hit;
mod store;

pub use hit::{epoch_seconds, CallbackHit, Injection, InjectionCallback};
pub use store::{CallbackStore, CALLBACKS_FILE, INJECTED_FILE};
