//! Tests for the token service

mod cleanup_tests;
