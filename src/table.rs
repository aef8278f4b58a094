use std::io::{Read, Result as IoResult, Seek};

use byteorder::{ReadBytesExt, LE};

use super::consts::*;
use super::crypto::*;
use super::error::Error;
use super::seeker::Seeker;

#[derive(Debug, Clone, Copy)]
pub(crate) struct HashEntry {
    pub(crate) hash_a: u32,
    pub(crate) hash_b: u32,
    pub(crate) language: u16,
    pub(crate) platform: u16,
    pub(crate) block_index: u32,
}

impl HashEntry {
    fn from_reader<R: Read>(mut reader: R) -> IoResult<HashEntry> {
        let hash_a = reader.read_u32::<LE>()?;
        let hash_b = reader.read_u32::<LE>()?;
        let language = reader.read_u16::<LE>()?;
        let platform = reader.read_u16::<LE>()?;
        let block_index = reader.read_u32::<LE>()?;

        Ok(HashEntry {
            hash_a,
            hash_b,
            language,
            platform,
            block_index,
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.block_index == HASH_TABLE_EMPTY_ENTRY
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.block_index == HASH_TABLE_DELETED_ENTRY
    }
}

#[derive(Debug)]
pub(crate) struct FileHashTable {
    entries: Vec<HashEntry>,
}

impl FileHashTable {
    pub(crate) fn from_seeker<R>(seeker: &mut Seeker<R>) -> Result<FileHashTable, Error>
    where
        R: Read + Seek,
    {
        let info = seeker.info().hash_table_info;
        let mut raw_data = seeker.read(info.offset, info.size)?;
        decrypt_mpq_block(&mut raw_data, *HASH_TABLE_KEY);

        let mut entries = Vec::with_capacity(info.entries as usize);
        let mut slice = &raw_data[..];
        for _ in 0..info.entries {
            entries.push(HashEntry::from_reader(&mut slice).map_err(|_| Error::InvalidArchive)?);
        }

        Ok(FileHashTable { entries })
    }

    /// Resolves a name fingerprint to its hash entry by linear open
    /// addressing from the home bucket. A never-occupied slot ends the
    /// probe; a deleted slot does not. At most one full sweep of the
    /// table is made, so a fully occupied table still terminates.
    pub(crate) fn find(&self, fingerprint: (u32, u32, u32)) -> Option<&HashEntry> {
        let (index_hash, hash_a, hash_b) = fingerprint;
        let hash_mask = self.entries.len() - 1;

        let start_index = index_hash as usize & hash_mask;
        let mut index = start_index;

        loop {
            let inspected = &self.entries[index];

            if inspected.is_empty() {
                break;
            }

            if !inspected.is_deleted()
                && inspected.hash_a == hash_a
                && inspected.hash_b == hash_b
            {
                return Some(inspected);
            }

            index = (index + 1) & hash_mask;
            if index == start_index {
                break;
            }
        }

        None
    }
}

#[derive(Debug)]
pub(crate) struct BlockEntry {
    pub(crate) block_offset: u32,
    pub(crate) block_size: u32,
    pub(crate) file_size: u32,
    pub(crate) flags: u32,
}

impl BlockEntry {
    fn from_reader<R: Read>(mut reader: R) -> IoResult<BlockEntry> {
        let block_offset = reader.read_u32::<LE>()?;
        let block_size = reader.read_u32::<LE>()?;
        let file_size = reader.read_u32::<LE>()?;
        let flags = reader.read_u32::<LE>()?;

        Ok(BlockEntry {
            block_offset,
            block_size,
            file_size,
            flags,
        })
    }

    pub(crate) fn is_file(&self) -> bool {
        (self.flags & MPQ_FILE_EXISTS) != 0
    }

    pub(crate) fn is_imploded(&self) -> bool {
        (self.flags & MPQ_FILE_IMPLODE) != 0
    }

    pub(crate) fn is_compressed(&self) -> bool {
        (self.flags & MPQ_FILE_COMPRESS) != 0
    }

    /// Either compression flavour; such files store a packed offset table.
    pub(crate) fn is_packed(&self) -> bool {
        (self.flags & MPQ_FILE_COMPRESS_MASK) != 0
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        (self.flags & MPQ_FILE_ENCRYPTED) != 0
    }

    pub(crate) fn is_single_unit(&self) -> bool {
        (self.flags & MPQ_FILE_SINGLE_UNIT) != 0
    }

    pub(crate) fn has_sector_checksums(&self) -> bool {
        (self.flags & MPQ_FILE_SECTOR_CRC) != 0
    }
}

#[derive(Debug)]
pub(crate) struct FileBlockTable {
    entries: Vec<BlockEntry>,
}

impl FileBlockTable {
    pub(crate) fn from_seeker<R>(seeker: &mut Seeker<R>) -> Result<FileBlockTable, Error>
    where
        R: Read + Seek,
    {
        let info = seeker.info().block_table_info;
        let mut raw_data = seeker.read(info.offset, info.size)?;
        decrypt_mpq_block(&mut raw_data, *BLOCK_TABLE_KEY);

        let mut entries = Vec::with_capacity(info.entries as usize);
        let mut slice = &raw_data[..];
        for _ in 0..info.entries {
            entries.push(BlockEntry::from_reader(&mut slice).map_err(|_| Error::InvalidArchive)?);
        }

        Ok(FileBlockTable { entries })
    }

    pub(crate) fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    /// Indices of the entries carrying the file flag, in table order.
    pub(crate) fn file_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_file())
            .map(|(index, _)| index)
            .collect()
    }

    /// Number of non-file entries below `limit` in table order.
    pub(crate) fn non_files_below(&self, limit: u32) -> u32 {
        self.entries
            .iter()
            .take(limit as usize)
            .filter(|entry| !entry.is_file())
            .count() as u32
    }
}

/// The high 16 bits of each block offset, for archives over 4 GiB.
/// Stored as a bare u16 array, neither encrypted nor compressed.
#[derive(Debug)]
pub(crate) struct ExtBlockTable {
    high_offsets: Vec<u16>,
}

impl ExtBlockTable {
    pub(crate) fn from_seeker<R>(seeker: &mut Seeker<R>) -> Result<ExtBlockTable, Error>
    where
        R: Read + Seek,
    {
        let offset = seeker.info().ext_block_table_offset;
        let entries = seeker.info().block_table_info.entries;
        let raw_data = seeker.read(offset, entries * 2)?;

        let mut high_offsets = Vec::with_capacity(entries as usize);
        let mut slice = &raw_data[..];
        for _ in 0..entries {
            high_offsets.push(
                slice
                    .read_u16::<LE>()
                    .map_err(|_| Error::InvalidArchive)?,
            );
        }

        Ok(ExtBlockTable { high_offsets })
    }

    /// Bits 32..48 of the block offset for the given raw block index.
    pub(crate) fn high_bits(&self, index: usize) -> u64 {
        u64::from(self.high_offsets[index]) << 32
    }
}

#[derive(Debug)]
pub(crate) struct SectorOffsets {
    offsets: Vec<u32>,
}

impl SectorOffsets {
    /// Obtains the packed offset table of a file: read from the block for
    /// packed multi-sector files, synthesized for everything else (the
    /// offsets of a stored file are implied by the sector size).
    ///
    /// `base` is the archive-relative offset of the block, high bits
    /// included.
    pub(crate) fn from_seeker<R>(
        seeker: &mut Seeker<R>,
        block_entry: &BlockEntry,
        base: u64,
        sector_count: u32,
    ) -> Result<SectorOffsets, Error>
    where
        R: Read + Seek,
    {
        if block_entry.is_packed() && !block_entry.is_single_unit() {
            if block_entry.is_encrypted() {
                return Err(Error::NotImplemented {
                    feature: "encrypted sector offset table",
                });
            }

            let mut slots = sector_count + 1;
            if block_entry.has_sector_checksums() {
                // one trailing slot for the checksum sector; read and
                // never consumed
                slots += 1;
            }

            let raw_data = seeker.read(base, u64::from(slots) * 4)?;
            let mut slice = &raw_data[..];
            let mut offsets = vec![0u32; slots as usize];
            for slot in offsets.iter_mut() {
                *slot = slice.read_u32::<LE>().map_err(|_| Error::InvalidArchive)?;
            }

            Ok(SectorOffsets { offsets })
        } else if block_entry.is_single_unit() {
            Ok(SectorOffsets {
                offsets: vec![0, block_entry.block_size],
            })
        } else {
            let sector_size = seeker.info().sector_size;
            let mut offsets = Vec::with_capacity(sector_count as usize + 1);
            for k in 0..sector_count {
                offsets.push(k * sector_size);
            }
            offsets.push(block_entry.block_size);

            Ok(SectorOffsets { offsets })
        }
    }

    /// Offset and stored size of one sector within the block. `None` for
    /// an out-of-range index or a table whose offsets do not ascend.
    pub(crate) fn one(&self, index: usize) -> Option<(u32, u32)> {
        if index >= (self.offsets.len() - 1) {
            None
        } else {
            let size = self.offsets[index + 1].checked_sub(self.offsets[index])?;
            Some((self.offsets[index], size))
        }
    }
}
