//! Property-based tests for the output stream using proptest.
//!
//! Covered invariants:
//!
//! - Noise text never reaches the buffer
//! - Text containing `Error:` is always buffered at error level
//! - A drain empties the buffer
//! - Writes to a closed stream leave the buffer unchanged
