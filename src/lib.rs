//! # duosida-direct - direct control of Duosida EV chargers
//!
//! Talks to Duosida wall chargers over their local TCP protocol (port 9988),
//! without the vendor cloud.
//!
//! ## Architecture
//!
//! - `wire`: schema-less tagged-field codec (varints, fixed-width numbers,
//!   length-delimited text or bytes)
//! - `envelope`: locates the live status payload inside the nested frames the
//!   charger sends, and the device identity next to it
//! - `status`: [`ChargerStatus`] snapshot and its derived views
//! - `session`: handshake, sequence counter, status polling with cache
//!   fallback, commands and the monitor loop
//! - `discovery`: UDP broadcast scan for chargers on the local network
//! - `config`: YAML configuration and validation
//! - `logging`: structured logging and tracing
//! - `error`: error taxonomy shared by every module
//!
//! ```no_run
//! use duosida_direct::ChargerSession;
//!
//! let mut session = ChargerSession::new("192.168.1.100", 9988, "0310107112122360374");
//! if session.connect() {
//!     if let Ok(Some(status)) = session.get_status(3, true) {
//!         println!("{}", status);
//!     }
//!     session.set_max_current(16);
//!     session.disconnect();
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod session;
pub mod status;
pub mod wire;

// Re-export commonly used types
pub use config::Config;
pub use discovery::{DiscoveredCharger, discover_chargers};
pub use error::{ChargerError, Result};
pub use session::{ChargerSession, MonitorOptions, MonitorSummary, SessionState, SessionTiming};
pub use status::{ChargerStatus, ConnectionState};
