//! Subscription admission control
//!
//! A room can hold far more publishers than a client can afford to receive.
//! The admission controller ranks publishers on a fixed tick and converges
//! the live subscription set toward the top of the ranking:
//!
//! ```text
//!   publish/unpublish/leave events ──► publisher maps ──┐
//!   presence feed ────────────────────► admin list ─────┤
//!   VAD side-channel ─────────────────► PrioritySignals ┼──► tick()
//!   scene positions ──────────────────► distances ──────┘      │
//!                                                              ▼
//!                                    TickPlan { subscribe, unsubscribe,
//!                                               play, stop }
//! ```
//!
//! The tick itself is synchronous; the session loop executes the plan
//! asynchronously and reports outcomes back for rollback.

pub mod config;
pub mod controller;
pub mod ranking;

pub use config::AdmissionConfig;
pub use controller::{AdmissionController, Subscription, SubscriptionState, TickPlan};
