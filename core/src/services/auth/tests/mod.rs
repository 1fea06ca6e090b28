//! Tests for the authentication service

mod fixtures;
mod service_tests;
