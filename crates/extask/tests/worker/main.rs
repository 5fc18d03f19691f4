//! Integration tests for the task worker runtime.

mod runtime;
mod support;
