//! # Flowright Event Bus
//!
//! Per-execution broadcast of NodeRun status transitions, backing the
//! Control API's WebSocket stream (§6). Deliberately in-process only: there
//! is no durability requirement on this channel, only on the Execution
//! Store (C7) that the Control API reads for anything a client needs to
//! replay after reconnecting.

mod bus;
mod event;

pub use bus::EventBus;
pub use event::NodeStatusEvent;
