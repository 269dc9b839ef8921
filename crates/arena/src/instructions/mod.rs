//! Command handlers

pub mod admin;
pub mod player;
pub mod tournament;
