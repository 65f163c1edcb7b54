//! # warden_research
//!
//! Best-effort contextual research for Codewarden.
//!
//! Research is purely advisory: every outcome, including timeouts and
//! transport failures, is delivered as plain text. Callers never see an
//! error and never need a timeout branch; empty or sentinel content is
//! simply ignored by prompt construction downstream.

pub mod client;

pub use client::{Research, ResearchClient};
