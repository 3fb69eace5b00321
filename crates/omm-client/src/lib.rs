//! Client for the OpenMobility Manager (OMM) AXI interface.
//!
//! AXI is a request/response protocol of NUL-terminated XML elements over TLS. Every request
//! carries a `seq` attribute which the matching `...Resp` echoes back.

mod axi;
mod client;
mod error;
mod types;

pub use axi::AxiMessage;
pub use client::{AxiStream, OmmClient};
pub use error::OmmError;
pub use types::*;
