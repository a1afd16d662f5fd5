//! Local filesystem side of a snapshot: scanning the backup directory,
//! hashing and counting export files, and writing the manifest.
//!
//! All writes go through [`atomic_write`], which writes a temporary file and
//! renames it into place so a manifest is never observed half-written.

mod atomic;
mod count;
mod manifest;

pub use atomic::{atomic_write, sha256_file};
pub use count::{COMMON_COLLECTION_KEYS, count_csv_rows, count_json_items};
pub use manifest::{ExpectedFile, ManifestBuilder, default_expected_files, read_manifest, write_manifest};
