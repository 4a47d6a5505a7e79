//! Terminal output for render callbacks.

mod surface;

pub use surface::{truncate, Surface};
