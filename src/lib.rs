//! quiesce: single-package entry point.
//! The buffer coordinator, session store, and support crates are embedded as
//! local modules under `src/`.

pub mod prelude;

#[path = "buffer/lib.rs"]
pub mod buffer;
#[path = "errors/lib.rs"]
pub mod errors;
#[path = "store/lib.rs"]
pub mod store;
#[path = "utils/lib.rs"]
pub mod utils;
