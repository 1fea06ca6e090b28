//! Tests for the in-memory token repository
