//! Controller channel abstraction
//!
//! This module defines the trait every controller backend implements and
//! the status codes those backends return.

mod status;
mod traits;

pub use status::*;
pub use traits::*;
