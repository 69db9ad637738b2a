//! Command handlers for the lanbeacon CLI.

pub mod advertise;
pub mod config;
pub mod handshake;
pub mod logging;
pub mod probe;

pub use advertise::*;
pub use config::*;
pub use handshake::*;
pub use logging::*;
pub use probe::*;
