#![cfg_attr(doc, doc = include_str!("../README.md"))]

#[cfg(feature = "chat")]
pub mod chat;
pub mod error;
pub mod util;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub use ws::{Config, ConfigUpdate, ConnectionManager, ConnectionStatus};
