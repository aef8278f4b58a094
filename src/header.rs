use std::io::{Read, Result as IoResult};

use byteorder::{ReadBytesExt, LE};

/// The optional user-data shunt that precedes the archive proper.
///
/// SC2 replay containers always carry one at offset 0: the replay header
/// lives in its payload, and the archive header follows at
/// `file_header_offset`. All in-archive offsets are then relative to that
/// origin.
#[derive(Debug)]
pub(crate) struct UserData {
    pub(crate) user_data_size: u32,
    pub(crate) file_header_offset: u32,
    pub(crate) payload: Vec<u8>,
}

impl UserData {
    pub(crate) fn from_reader<R: Read>(mut reader: R) -> IoResult<UserData> {
        let user_data_size = reader.read_u32::<LE>()?;
        let file_header_offset = reader.read_u32::<LE>()?;

        let mut payload = vec![0u8; user_data_size as usize];
        reader.read_exact(&mut payload)?;

        Ok(UserData {
            user_data_size,
            file_header_offset,
            payload,
        })
    }
}

/// The archive header. The v1 extension fields are read only when
/// `format_version > 0` and stay zero otherwise.
#[derive(Debug)]
pub(crate) struct FileHeader {
    pub(crate) header_size: u32,
    pub(crate) archive_size: u32,
    pub(crate) format_version: u16,
    pub(crate) sector_size_shift: u16,
    pub(crate) hash_table_offset: u32,
    pub(crate) block_table_offset: u32,
    pub(crate) hash_table_entries: u32,
    pub(crate) block_table_entries: u32,

    pub(crate) ext_block_table_offset: u64,
    pub(crate) hash_table_offset_high: u16,
    pub(crate) block_table_offset_high: u16,
}

impl FileHeader {
    pub(crate) fn from_reader<R: Read>(mut reader: R) -> IoResult<FileHeader> {
        let header_size = reader.read_u32::<LE>()?;
        let archive_size = reader.read_u32::<LE>()?;
        let format_version = reader.read_u16::<LE>()?;
        let sector_size_shift = reader.read_u16::<LE>()?;
        let hash_table_offset = reader.read_u32::<LE>()?;
        let block_table_offset = reader.read_u32::<LE>()?;
        let hash_table_entries = reader.read_u32::<LE>()?;
        let block_table_entries = reader.read_u32::<LE>()?;

        let mut ext_block_table_offset = 0;
        let mut hash_table_offset_high = 0;
        let mut block_table_offset_high = 0;

        if format_version > 0 {
            ext_block_table_offset = reader.read_u64::<LE>()?;
            hash_table_offset_high = reader.read_u16::<LE>()?;
            block_table_offset_high = reader.read_u16::<LE>()?;
        }

        Ok(FileHeader {
            header_size,
            archive_size,
            format_version,
            sector_size_shift,
            hash_table_offset,
            block_table_offset,
            hash_table_entries,
            block_table_entries,
            ext_block_table_offset,
            hash_table_offset_high,
            block_table_offset_high,
        })
    }
}
