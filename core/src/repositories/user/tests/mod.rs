//! Tests for the in-memory user repository
