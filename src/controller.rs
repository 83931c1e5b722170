//! Wires configuration, reporting relay, capabilities and listeners together.

pub mod controller_handler;
