//! # Observability
//!
//! [`setup_tracing`] installs the subscriber used by the binary. Every protocol
//! action already flows through `tracing` (see [`crate::event::EventLog::record`]),
//! so the log you see on the console is the event log as it happens.
//!
//! Each actor runs inside an `actor{id=...}` span and each protocol run inside a
//! `protocol{name=...}` span, so the compact format reads like:
//!
//! ```text
//! INFO protocol{name=barber}:actor{id=client-3}: event actor=client-3 action=turned-away state=chairs 3/3 taken
//! ```
//!
//! Verbosity is controlled with `RUST_LOG`:
//!
//! ```bash
//! RUST_LOG=info cargo run                                   # one line per event
//! RUST_LOG=debug cargo run                                  # plus actor start/finish
//! RUST_LOG=coordination_framework::sync=trace cargo run     # every lock hand-over
//! ```

/// Initializes a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
