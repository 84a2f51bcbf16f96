//! Consolidated test modules.
//!
//! End-to-end sweeps against real temporary directories, wired the same way
//! the binary wires them.
