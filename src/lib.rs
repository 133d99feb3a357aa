//! Onion forum scanner library.
//!
//! Fetches onion pages through a local Tor proxy, decides whether they are
//! discussion forums, and extracts their threads and posts. A watchlist
//! scheduler rescans tracked sites on their own cadence.

#![allow(clippy::needless_raw_string_hashes)]

pub mod activity;
pub mod cli;
pub mod clock;
pub mod config;
pub mod constants;
pub mod db;
pub mod manual;
pub mod persist;
pub mod scanner;
pub mod watchlist;
