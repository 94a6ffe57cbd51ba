//! Lingr chat bot backed by the docomo dialogue and character recognition APIs.

pub mod bot;
pub mod command;
pub mod config;
pub mod docomo;
pub mod lingr;
pub mod logging;
pub mod server;
