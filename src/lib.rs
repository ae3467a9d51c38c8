#[macro_use] pub mod core;
#[macro_use] pub mod types;

pub mod cli;
pub mod config;
pub mod flex;
pub mod formats;
pub mod report;
pub mod summary;
pub mod time;
pub mod util;

mod formatting;
mod http;
