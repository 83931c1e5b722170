pub mod capabilities;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod network;
pub mod reporting;
pub mod sasl;
pub mod session_management;
