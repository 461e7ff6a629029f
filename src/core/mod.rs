//! Core Components
//!
//! Core infrastructure shared by the token subsystem and the request gateway.

pub mod state;
pub mod transport;

pub use state::*;
pub use transport::*;
