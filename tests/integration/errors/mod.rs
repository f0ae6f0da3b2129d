//! Failure handling tests: CA rejections, untrusted responses, and transport errors

mod protocol_test;
