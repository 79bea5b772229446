//! Loads spreadsheet-style table exports into the store.

pub mod dates;
mod loader;
pub mod records;

pub use loader::load_dir;
