//! Unit tests of the public library surface

mod basic_tests;
