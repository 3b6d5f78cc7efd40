//! Command dispatch for the device runtime
//!
//! This module handles:
//! - Resolving saved commands by name or index for every front-end
//! - Driving the transmit pump on a fixed period

mod pump;
mod resolver;

pub use pump::{LogTransmitter, PumpDriver};
pub use resolver::{CommandRef, ResolveError, Resolver};
