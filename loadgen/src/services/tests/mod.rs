//! Tests for loadgen services
