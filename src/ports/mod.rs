//! Port traits: the seams between the screening core and the outside world.

pub mod clock_port;
pub mod config_port;
pub mod history_port;
pub mod report_port;
pub mod resolver_port;
