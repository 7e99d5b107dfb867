// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Intercept pipeline: pending flows, operator decisions and the
//! process-wide intercept toggle
//!
//! The broker is a process-local rendezvous between proxy workers that pause
//! a live flow and operators that decide its fate. Nothing here touches the
//! network or the disk except the toggle's small state file.

mod broker;
mod flow;
mod toggle;

pub use broker::InterceptBroker;
pub use flow::{Decision, DecisionKind, Flow, FlowBody, FlowData, Modification};
pub use toggle::{InterceptToggle, STATE_FILE};
