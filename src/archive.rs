use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use super::compress::decompress_multi;
use super::crypto::file_name_hash;
use super::error::Error;
use super::seeker::Seeker;
use super::table::*;
use super::util::sector_count_from_size;

/// A read-only view of an MPQ archive.
///
/// Works on any reader that implements `Read + Seek`; pass a `&mut R` to
/// keep ownership of the reader on the caller's side. Opening parses all
/// archive metadata up front; file content is read on demand.
///
/// The handle is not safe to share across threads concurrently - the
/// input cursor moves on every read. Open one handle per thread, or
/// serialize access externally.
#[derive(Debug)]
pub struct Archive<R: Read + Seek> {
    seeker: Seeker<R>,
    hash_table: FileHashTable,
    block_table: FileBlockTable,
    ext_block_table: Option<ExtBlockTable>,
    file_indices: Vec<usize>,
}

impl Archive<BufReader<File>> {
    /// Opens an archive from a filesystem path. The archive owns the file
    /// and releases it on drop.
    ///
    /// A file that cannot be opened at the OS level surfaces as
    /// [`Error::Io`]; a file that opens but does not parse surfaces as
    /// [`Error::InvalidArchive`].
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Archive<BufReader<File>>, Error> {
        let file = File::open(path)?;

        Archive::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Tries to open an MPQ archive from the specified `reader`.
    ///
    /// Immediately, this will perform the following:
    ///
    /// 1. Locate the archive header, following the user-data shunt if the
    ///    input starts with one.
    /// 2. Locate, decrypt and read the hash table.
    /// 3. Locate, decrypt and read the block table.
    /// 4. Read the extended block table, if the archive has one.
    ///
    /// If any of these steps fail, the archive is deemed corrupted and an
    /// appropriate error is returned. No file content is read.
    pub fn open(reader: R) -> Result<Archive<R>, Error> {
        let mut seeker = Seeker::new(reader)?;

        let hash_table = FileHashTable::from_seeker(&mut seeker)?;
        let block_table = FileBlockTable::from_seeker(&mut seeker)?;

        let ext_block_table = if seeker.info().ext_block_table_offset > 0 {
            Some(ExtBlockTable::from_seeker(&mut seeker)?)
        } else {
            None
        };

        let file_indices = block_table.file_indices();

        Ok(Archive {
            seeker,
            hash_table,
            block_table,
            ext_block_table,
            file_indices,
        })
    }

    /// Reads a file's contents by name.
    ///
    /// Name resolution is case-insensitive and treats backslashes (`\`)
    /// and forward slashes (`/`) as the same character.
    ///
    /// A missing file is `Ok(None)`, not an error: absence is an answer,
    /// and it leaves the handle fully usable. Errors are reserved for a
    /// damaged archive or a storage scheme this decoder does not
    /// implement (encrypted or imploded files).
    pub fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>, Error> {
        self.read_file_by_hash(file_name_hash(name))
    }

    /// Reads a file's contents by its precomputed name fingerprint, as
    /// returned by [`file_name_hash`](crate::file_name_hash). Same
    /// contract as [`read_file`](Archive::read_file).
    pub fn read_file_by_hash(
        &mut self,
        fingerprint: (u32, u32, u32),
    ) -> Result<Option<Vec<u8>>, Error> {
        let hash_entry = match self.hash_table.find(fingerprint) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        // The stored index is interpreted against the file-only sequence:
        // non-file entries below it are counted off before indexing
        // file_indices. Kept as observed in the wild for compatibility
        // with existing replay corpora.
        let skipped = self.block_table.non_files_below(hash_entry.block_index);
        let file_ordinal = hash_entry.block_index.wrapping_sub(skipped) as usize;
        if file_ordinal >= self.file_indices.len() {
            return Ok(None);
        }
        let raw_block = self.file_indices[file_ordinal];

        let block_entry = match self.block_table.get(raw_block) {
            Some(entry) => entry,
            None => return Err(Error::InvalidArchive),
        };

        // Archive-relative base of the block; the seeker folds in the
        // header origin on every read.
        let base = u64::from(block_entry.block_offset)
            + self
                .ext_block_table
                .as_ref()
                .map_or(0, |table| table.high_bits(raw_block));

        let sector_size = self.seeker.info().sector_size;
        let sector_count = if block_entry.is_single_unit() {
            1
        } else {
            sector_count_from_size(block_entry.file_size, sector_size)
        };

        let sector_offsets =
            SectorOffsets::from_seeker(&mut self.seeker, block_entry, base, sector_count)?;

        let mut content = vec![0u8; block_entry.file_size as usize];
        let mut content_index: usize = 0;

        // grows monotonically across the sectors of this read
        let mut in_buf: Vec<u8> = Vec::new();

        for k in 0..sector_count {
            let unpacked = if block_entry.is_single_unit() {
                block_entry.file_size as usize
            } else if k + 1 < sector_count {
                sector_size as usize
            } else {
                (block_entry.file_size - sector_size * k) as usize
            };

            let (sector_offset, in_size) = sector_offsets
                .one(k as usize)
                .ok_or(Error::InvalidArchive)?;

            in_buf.resize(in_size as usize, 0);
            self.seeker
                .read_into(base + u64::from(sector_offset), &mut in_buf)?;

            if block_entry.is_encrypted() {
                return Err(Error::NotImplemented {
                    feature: "encrypted file data",
                });
            }

            let dst = &mut content[content_index..content_index + unpacked];

            if block_entry.is_compressed() && in_size as usize != unpacked {
                decompress_multi(dst, &in_buf)?;
            } else if block_entry.is_imploded() {
                return Err(Error::NotImplemented {
                    feature: "PKWare imploded file data",
                });
            } else {
                // stored verbatim, sizes must line up
                if in_size as usize != unpacked {
                    return Err(Error::InvalidArchive);
                }
                dst.copy_from_slice(&in_buf);
            }

            content_index += unpacked;
        }

        Ok(Some(content))
    }

    /// Number of files in the archive (block entries carrying the file
    /// flag; free and unused entries don't count).
    pub fn files_count(&self) -> u32 {
        self.file_indices.len() as u32
    }

    /// The raw payload of the user-data shunt preceding the header, if
    /// the archive has one. For SC2 replays this holds the replay header.
    pub fn user_data(&self) -> Option<&[u8]> {
        self.seeker
            .user_data()
            .map(|user_data| user_data.payload.as_slice())
    }

    /// Size in bytes of a logical sector of this archive.
    pub fn sector_size(&self) -> u32 {
        self.seeker.info().sector_size
    }

    /// If the archive contains a `(listfile)`, parses it and returns all
    /// known file names.
    pub fn files(&mut self) -> Option<Vec<String>> {
        let listfile = self.read_file("(listfile)").ok()??;

        let mut list = Vec::new();
        let mut line_start = 0;
        for i in 0..=listfile.len() {
            let at_end = i == listfile.len();
            if at_end || listfile[i] == b'\r' || listfile[i] == b'\n' {
                if i > line_start {
                    if let Ok(line) = std::str::from_utf8(&listfile[line_start..i]) {
                        list.push(line.to_string());
                    }
                }
                line_start = i + 1;
            }
        }

        Some(list)
    }

    /// Consumes the archive, handing back the underlying reader.
    pub fn into_reader(self) -> R {
        self.seeker.into_reader()
    }
}
