use std::io::{ErrorKind, Read, Seek, SeekFrom};

use byteorder::{ReadBytesExt, LE};

use super::consts::*;
use super::error::Error;
use super::header::*;

/// Owns the input and serves bounds-checked reads at archive-relative
/// offsets. Locating the header is the only structural work done here;
/// table parsing lives with the tables.
#[derive(Debug)]
pub(crate) struct Seeker<R: Read + Seek> {
    reader: R,
    user_data: Option<UserData>,
    archive_info: ArchiveInfo,
}

impl<R: Read + Seek> Seeker<R> {
    pub(crate) fn new(mut reader: R) -> Result<Seeker<R>, Error> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        // A too-short input fails the magic read and is just as invalid
        // as a wrong magic.
        let mut magic = reader
            .read_u32::<LE>()
            .map_err(|_| Error::InvalidArchive)?;

        let mut user_data = None;
        let mut header_offset: u64 = 0;

        if magic == HEADER_USER_MAGIC {
            let shunt = UserData::from_reader(&mut reader).map_err(|_| Error::InvalidArchive)?;
            header_offset = u64::from(shunt.file_header_offset);

            if header_offset >= file_size {
                return Err(Error::InvalidArchive);
            }

            reader
                .seek(SeekFrom::Start(header_offset))
                .map_err(|_| Error::InvalidArchive)?;
            magic = reader
                .read_u32::<LE>()
                .map_err(|_| Error::InvalidArchive)?;

            user_data = Some(shunt);
        }

        if magic != HEADER_MPQ_MAGIC {
            return Err(Error::InvalidArchive);
        }

        let header = FileHeader::from_reader(&mut reader).map_err(|_| Error::InvalidArchive)?;
        let archive_info = ArchiveInfo::new(file_size, header_offset, &header)?;

        Ok(Seeker {
            reader,
            user_data,
            archive_info,
        })
    }

    fn archive_offset(&self, offset: u64) -> u64 {
        offset + self.archive_info.header_offset
    }

    pub(crate) fn info(&self) -> &ArchiveInfo {
        &self.archive_info
    }

    pub(crate) fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    pub(crate) fn read(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; size as usize];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads into a caller-owned buffer so sector loops can amortize the
    /// allocation across sectors.
    pub(crate) fn read_into(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let offset = self.archive_offset(offset);

        if offset + buf.len() as u64 > self.archive_info.file_size {
            return Err(Error::InvalidArchive);
        }

        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|_| Error::InvalidArchive)?;

        if let Err(cause) = self.reader.read_exact(buf) {
            return Err(if cause.kind() == ErrorKind::UnexpectedEof {
                Error::InvalidArchive
            } else {
                Error::Io { cause }
            });
        }

        Ok(())
    }

    pub(crate) fn into_reader(self) -> R {
        self.reader
    }
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct TableInfo {
    pub(crate) entries: u64,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

#[derive(Debug)]
pub(crate) struct ArchiveInfo {
    pub(crate) hash_table_info: TableInfo,
    pub(crate) block_table_info: TableInfo,

    /// Archive-relative offset of the extended block table; zero when the
    /// archive has none.
    pub(crate) ext_block_table_offset: u64,

    pub(crate) sector_size: u32,
    pub(crate) file_size: u64,
    pub(crate) header_offset: u64,
}

impl ArchiveInfo {
    fn new(file_size: u64, header_offset: u64, header: &FileHeader) -> Result<ArchiveInfo, Error> {
        // The directory probe masks with entries - 1, so a non-power-of-two
        // table cannot be addressed.
        if !header.hash_table_entries.is_power_of_two() {
            return Err(Error::InvalidArchive);
        }

        // 512 << 15 is already a 16 MiB sector; real archives use shift 3.
        if header.sector_size_shift > 15 {
            return Err(Error::InvalidArchive);
        }

        let hash_table_info = TableInfo {
            entries: u64::from(header.hash_table_entries),
            offset: (u64::from(header.hash_table_offset_high) << 32)
                + u64::from(header.hash_table_offset),
            size: u64::from(header.hash_table_entries) * u64::from(HASH_TABLE_ENTRY_SIZE),
        };

        let block_table_info = TableInfo {
            entries: u64::from(header.block_table_entries),
            offset: (u64::from(header.block_table_offset_high) << 32)
                + u64::from(header.block_table_offset),
            size: u64::from(header.block_table_entries) * u64::from(BLOCK_TABLE_ENTRY_SIZE),
        };

        let sector_size = 512u32 << header.sector_size_shift;

        Ok(ArchiveInfo {
            hash_table_info,
            block_table_info,
            ext_block_table_offset: header.ext_block_table_offset,
            sector_size,
            file_size,
            header_offset,
        })
    }
}
