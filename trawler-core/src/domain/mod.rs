//! Core domain types
//!
//! This module contains the core domain structures used across Trawler
//! components. These types represent the fundamental entities shared between
//! the coordinator (which dispatches and tracks) and the worker environments
//! (which execute).

pub mod log;
pub mod plan;
pub mod worker;
