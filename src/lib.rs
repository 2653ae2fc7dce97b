//! Note-taking REST backend: CRUD over notes and users on Postgres, with a
//! read-through LRU cache in the service layer.

pub mod app;
pub mod cache;
pub mod config;
pub mod dates;
pub mod error;
pub mod notes;
pub mod state;
pub mod testing;
pub mod users;
