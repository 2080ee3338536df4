//! Integration tests for the agent pipeline
//!
//! These tests run the full command path (key resolution, database actor,
//! agent loop, extraction, activity log) against throwaway SQLite files. The
//! model is either scripted or served by a local HTTP mock, so no network
//! access or API key is needed.

pub mod report_pipeline;
