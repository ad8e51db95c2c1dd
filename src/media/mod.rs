//! Media submission types.

pub mod item;

pub use item::*;
