#[macro_use]
extern crate tracing;

mod app;
pub mod args;
pub mod commands;
mod logging;
pub mod schedule;

pub use app::App;
pub use args::{
    Args,
    Command,
};
pub use commands::exit_code;
pub use logging::{
    init_errors,
    init_logging,
};
