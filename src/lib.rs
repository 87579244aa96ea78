#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod cli;
pub mod config;
pub mod enforcement;
pub mod error;
pub mod event;
pub mod media_server;
pub mod monitor;
#[doc(hidden)]
pub mod observability;
pub mod quality;

pub use config::Config;
pub use enforcement::{Enforcer, Outcome};
pub use error::{DownshiftError, Result};
pub use event::InputEvent;
