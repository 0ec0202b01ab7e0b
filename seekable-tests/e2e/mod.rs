//! End-to-end tests for Seekable
//!
//! These tests run complete host workflows through `SeekableMedia`: load a
//! local or remote source, inspect it, fetch packets and export a range.

#[path = "../support.rs"]
mod support;

mod media_workflow;
