//! Interactive shell for mesh network gateways reachable over MQTT.
//!
//! The binary wires these modules together: [`config`] resolves the broker
//! profile, `meshgate-mqtt` feeds the hub, and [`shell::Shell`] runs the
//! command loop on stdin.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod shell;
