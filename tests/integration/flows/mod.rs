//! End-to-end certificate flow tests against a mock CA

mod certification_test;
mod initialization_test;
mod key_update_test;
