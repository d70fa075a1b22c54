//! Concrete network fabric: point-to-point links, a router stub, the
//! shared `Network` context, the simulator kernel's event wheel, and
//! file-backed tracing (spec §5, §6).

pub mod event_wheel;
pub mod link;
pub mod network;
pub mod router;
pub mod trace_writer;

pub use event_wheel::EventWheel;
pub use link::{CreditLink, NetworkLink};
pub use network::{LinkSpec, Network};
pub use router::Router;
pub use trace_writer::open_file_sinks;
