//! A read-only decoder for Blizzard's proprietary MoPaQ archive format,
//! covering the subset needed to extract files from StarCraft II replay
//! containers (`*.SC2Replay`).
//!
//! Opening an archive parses the user-data shunt (when present), the
//! header, and the encrypted hash and block tables. File content is then
//! reconstructed on demand by name or by precomputed name hashes.
//!
//! # Supported features
//!
//! Not the whole range of MPQ features is supported. Notably:
//!
//! * Encrypted files and encrypted sector offset tables are not
//!   decrypted; reading such a file fails with an explicit error.
//! * PKWare DCL, Huffman, sparse and IMA ADPCM compression are
//!   unsupported. SC2 replays use zlib (and occasionally bzip2), both of
//!   which are handled.
//! * Sector checksums and the `(attributes)` metadata are not verified or
//!   interpreted; `(attributes)` can still be extracted as raw bytes.
//! * Archives are never written or modified.
//!
//! Archives that deliberately subvert the MPQ structure (as some game
//! mods do) are out of scope; this crate targets the well-formed archives
//! the SC2 client itself produces.
//!
//! # Example
//!
//! ```no_run
//! # use sc2_mpq::Archive;
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let mut archive = Archive::open_path("automm.SC2Replay")?;
//!
//! if let Some(details) = archive.read_file("replay.details")? {
//!     println!("replay.details is {} bytes", details.len());
//! }
//! # Ok(())
//! # }
//! ```

#![allow(dead_code)]

pub(crate) mod compress;
pub(crate) mod consts;
pub(crate) mod crypto;
pub(crate) mod header;
pub(crate) mod seeker;
pub(crate) mod table;
pub(crate) mod util;

pub mod archive;
pub mod error;

pub use archive::Archive;
pub use crypto::file_name_hash;
pub use error::Error;
