//! Utility functions for the memcard CLI

pub mod display;
