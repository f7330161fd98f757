//! Mandalart - self-hosted Harada method goal tracker
//!
//! A mandalart board is a 9x9 grid: one primary goal in the center, eight
//! supporting sub-goals around it, and eight action items fanned out behind
//! each sub-goal. This crate serves boards over a small REST API backed by
//! SQLite.
//!
//! ## Services
//!
//! - **Boards**: primary goals, sub-goals, and action items with positions
//! - **Grid**: 9x9 board rendering with the coloring clients draw from
//! - **Logs**: dated activity entries (notes, metrics, media, links) per action
//! - **Guestbook**: visitor encouragement pinned to any level of a board
//! - **Auth**: cookie sessions and API keys over argon2 password hashes

pub mod auth;
pub mod color;
pub mod config;
pub mod db;
pub mod error;
pub mod grid;
pub mod routes;
pub mod server;
pub mod views;

pub use config::Args;
pub use error::{MandalartError, Result};
pub use server::{run, AppState};
