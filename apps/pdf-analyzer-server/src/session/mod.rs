//! Analysis sessions
//!
//! Each client works in its own session: a directory tree holding the
//! uploaded PDF, the rendered pages and the detected medical pages.
//!
//! Flow:
//! 1. Create a session
//! 2. Upload a PDF
//! 3. Convert pages to images
//! 4. Detect medical pages, which also builds the ZIP
//! 5. Download the ZIP

pub mod manager;
pub mod types;

pub use manager::SessionManager;
pub use types::*;
