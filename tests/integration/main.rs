//! Integration tests for Sumi-Harvest

mod harvest_tests;
