//! Sandwatch Core
//!
//! Core types shared by the sandwatch status client, lifecycle tracker and CLI.
//!
//! This crate contains:
//! - Domain types: jobs, lifecycle states, connection descriptors, error taxonomy
//! - DTOs: wire representations of the analysis backend's responses

pub mod domain;
pub mod dto;
