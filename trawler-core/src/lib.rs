//! Trawler Core
//!
//! Core types for the Trawler crawl coordinator.
//!
//! This crate contains:
//! - Domain types: Dispatch plans, worker lifecycle records, log levels
//! - DTOs: Wire contracts between the coordinator and worker environments

pub mod domain;
pub mod dto;
