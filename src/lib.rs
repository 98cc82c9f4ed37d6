#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod stream;

#[cfg(test)]
mod test_support;
