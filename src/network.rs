//! Transport layer: TCP listeners handing accepted connections to capabilities.

pub mod network_listener;
