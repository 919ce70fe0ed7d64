//! Headless OAuth login and API companion for game and music services.
//!
//! Opens browser-based authorization sessions, extracts or exchanges
//! the resulting tokens, and performs bearer-authenticated API calls
//! with uniform error classification. Credentials live in memory only.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod auth;
pub mod config;
pub mod credential;
pub mod error;
pub mod exchange;
pub mod extract;
pub mod http;
pub mod protocol;
pub mod provider;
pub mod session;
