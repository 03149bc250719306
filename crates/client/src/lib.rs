//! Polling client for the tubedl download service.
//!
//! Split into three layers:
//!
//! - [`api`]: the wire contract and an HTTP implementation of it,
//!   behind the [`api::QueryApi`] trait so the state machine can be
//!   tested against scripted responses.
//! - [`session`]: a pure, synchronous state machine tracking one user
//!   session (format list, selected format, active download, status
//!   messages). All timing decisions are expressed as return values.
//! - [`driver`]: the async loop that owns the timers (1s poll cadence,
//!   completion delays) and feeds poll outcomes into the session.

pub mod api;
pub mod driver;
pub mod session;
