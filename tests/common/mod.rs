//! In-memory archive fixtures.
//!
//! The library only ever decrypts and decompresses, so the test side
//! carries the encrypting halves: the crypt table, the encrypt routine,
//! and a small builder that lays out a complete archive byte-for-byte the
//! way the SC2 client does (optional shunt at offset 0, header, file
//! data, encrypted hash and block tables).

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use sc2_mpq::file_name_hash;

pub const SECTOR_SHIFT: u16 = 3;
pub const SECTOR_SIZE: usize = 512 << SECTOR_SHIFT;

pub const FLAG_EXISTS: u32 = 0x8000_0000;
pub const FLAG_SINGLE_UNIT: u32 = 0x0100_0000;
pub const FLAG_ENCRYPTED: u32 = 0x0001_0000;
pub const FLAG_COMPRESS: u32 = 0x0000_0200;
pub const FLAG_IMPLODE: u32 = 0x0000_0100;

const HASH_TABLE_KEY: u32 = 0xC3AF_3770;
const BLOCK_TABLE_KEY: u32 = 0xEC83_B3A3;

const HASH_ENTRY_EMPTY: u32 = 0xFFFF_FFFF;
const HASH_ENTRY_DELETED: u32 = 0xFFFF_FFFE;

const COMPRESSION_ZLIB: u8 = 0x02;

fn generate_crypto_table() -> [u32; 0x500] {
    let mut crypto_table = [0u32; 0x500];
    let mut seed: u32 = 0x0010_0001;

    for i in 0..0x100 {
        for j in 0..5 {
            let index = i + j * 0x100;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let t1 = (seed & 0xFFFF) << 0x10;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let t2 = seed & 0xFFFF;

            crypto_table[index] = t1 | t2;
        }
    }

    crypto_table
}

/// The encrypting inverse of the library's block decryption.
pub fn encrypt_mpq_block(data: &mut [u8], mut key: u32) {
    let crypto_table = generate_crypto_table();
    let mut key_secondary: u32 = 0xEEEE_EEEE;

    for chunk in data.chunks_exact_mut(4) {
        key_secondary = key_secondary
            .wrapping_add(crypto_table[(0x400 + (key & 0xFF)) as usize]);

        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let encrypted = word ^ key.wrapping_add(key_secondary);
        chunk.copy_from_slice(&encrypted.to_le_bytes());

        key = (!key << 0x15).wrapping_add(0x1111_1111) | (key >> 0x0B);
        key_secondary = word
            .wrapping_add(key_secondary)
            .wrapping_add(key_secondary << 5)
            .wrapping_add(3);
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn zlib_compress(content: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

#[derive(Clone, Copy, PartialEq)]
pub enum Storage {
    /// Raw sectors, no offset table in the block.
    Stored,
    /// Zlib-compressed sectors behind a packed offset table.
    Deflate,
    /// One unsplit region.
    SingleUnit,
    /// Carries the encrypted flag; the decoder must refuse it.
    EncryptedStored,
    /// Compressed and encrypted; the decoder must refuse the offset table.
    EncryptedDeflate,
    /// Carries the implode flag; the decoder must refuse it.
    Imploded,
}

struct FixtureFile {
    name: String,
    content: Vec<u8>,
    storage: Storage,
    tombstone_first: bool,
}

pub struct ArchiveBuilder {
    user_data: Option<Vec<u8>>,
    format_version: u16,
    with_ext_block_table: bool,
    hash_entries: u32,
    leading_free_blocks: usize,
    files: Vec<FixtureFile>,
}

impl ArchiveBuilder {
    pub fn new() -> ArchiveBuilder {
        ArchiveBuilder {
            user_data: None,
            format_version: 0,
            with_ext_block_table: false,
            hash_entries: 16,
            leading_free_blocks: 0,
            files: Vec::new(),
        }
    }

    /// Prepends a user-data shunt holding `payload`, with the header
    /// moved to the 512-byte boundary.
    pub fn user_data(mut self, payload: &[u8]) -> ArchiveBuilder {
        self.user_data = Some(payload.to_vec());
        self
    }

    /// Emits a v1 header with an (all-zero) extended block table.
    pub fn ext_block_table(mut self) -> ArchiveBuilder {
        self.format_version = 1;
        self.with_ext_block_table = true;
        self
    }

    /// Inserts free-space entries in front of the file entries in the
    /// block table.
    pub fn leading_free_blocks(mut self, count: usize) -> ArchiveBuilder {
        self.leading_free_blocks = count;
        self
    }

    pub fn file(self, name: &str, content: &[u8]) -> ArchiveBuilder {
        self.file_with(name, content, Storage::Stored)
    }

    pub fn file_with(mut self, name: &str, content: &[u8], storage: Storage) -> ArchiveBuilder {
        self.files.push(FixtureFile {
            name: name.to_string(),
            content: content.to_vec(),
            storage,
            tombstone_first: false,
        });
        self
    }

    /// Like `file_with`, but a tombstone with the same fingerprint sits
    /// in the file's home slot, as after a delete-and-re-add.
    pub fn tombstoned_file(mut self, name: &str, content: &[u8]) -> ArchiveBuilder {
        self.files.push(FixtureFile {
            name: name.to_string(),
            content: content.to_vec(),
            storage: Storage::Stored,
            tombstone_first: true,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let header_size: u32 = if self.format_version > 0 { 44 } else { 32 };
        let block_entries_total = self.leading_free_blocks + self.files.len();

        // Per-file data blobs and their block entries.
        let mut data = Vec::new();
        let mut block_entries: Vec<(u32, u32, u32, u32)> = Vec::new();
        for _ in 0..self.leading_free_blocks {
            block_entries.push((0, 0, 0, 0));
        }

        for file in &self.files {
            let offset = header_size + data.len() as u32;
            let (blob, flags) = encode_file(file);
            block_entries.push((offset, blob.len() as u32, file.content.len() as u32, flags));
            data.extend(blob);
        }

        // Hash table with the same probe the decoder uses.
        let mask = (self.hash_entries - 1) as usize;
        let mut hash_slots: Vec<(u32, u32, u16, u16, u32)> =
            vec![(0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF, 0x00FF, HASH_ENTRY_EMPTY); self.hash_entries as usize];

        for (ordinal, file) in self.files.iter().enumerate() {
            let (h1, h2, h3) = file_name_hash(&file.name);
            let raw_block = (self.leading_free_blocks + ordinal) as u32;

            if file.tombstone_first {
                let slot = free_slot(&hash_slots, h1 as usize & mask, mask);
                hash_slots[slot] = (h2, h3, 0, 0, HASH_ENTRY_DELETED);
            }

            let slot = free_slot(&hash_slots, h1 as usize & mask, mask);
            hash_slots[slot] = (h2, h3, 0, 0, raw_block);
        }

        let mut hash_table = Vec::new();
        for (hash_a, hash_b, language, platform, block_index) in &hash_slots {
            push_u32(&mut hash_table, *hash_a);
            push_u32(&mut hash_table, *hash_b);
            push_u16(&mut hash_table, *language);
            push_u16(&mut hash_table, *platform);
            push_u32(&mut hash_table, *block_index);
        }
        encrypt_mpq_block(&mut hash_table, HASH_TABLE_KEY);

        let mut block_table = Vec::new();
        for (offset, size, file_size, flags) in &block_entries {
            push_u32(&mut block_table, *offset);
            push_u32(&mut block_table, *size);
            push_u32(&mut block_table, *file_size);
            push_u32(&mut block_table, *flags);
        }
        encrypt_mpq_block(&mut block_table, BLOCK_TABLE_KEY);

        let hash_table_offset = header_size + data.len() as u32;
        let block_table_offset = hash_table_offset + hash_table.len() as u32;
        let ext_block_table_offset = block_table_offset + block_table.len() as u32;
        let archive_size = if self.with_ext_block_table {
            ext_block_table_offset + block_entries_total as u32 * 2
        } else {
            ext_block_table_offset
        };

        // Assemble the container.
        let mut out = Vec::new();

        if let Some(payload) = &self.user_data {
            assert!(payload.len() + 12 <= 512, "shunt payload too large");
            out.extend_from_slice(b"MPQ\x1B");
            push_u32(&mut out, payload.len() as u32);
            push_u32(&mut out, 512);
            out.extend_from_slice(payload);
            out.resize(512, 0);
        }

        out.extend_from_slice(b"MPQ\x1A");
        push_u32(&mut out, header_size);
        push_u32(&mut out, archive_size);
        push_u16(&mut out, self.format_version);
        push_u16(&mut out, SECTOR_SHIFT);
        push_u32(&mut out, hash_table_offset);
        push_u32(&mut out, block_table_offset);
        push_u32(&mut out, self.hash_entries);
        push_u32(&mut out, block_entries_total as u32);

        if self.format_version > 0 {
            let ext_offset = if self.with_ext_block_table {
                u64::from(ext_block_table_offset)
            } else {
                0
            };
            push_u64(&mut out, ext_offset);
            push_u16(&mut out, 0); // hash table offset, high bits
            push_u16(&mut out, 0); // block table offset, high bits
        }

        out.extend(data);
        out.extend(hash_table);
        out.extend(block_table);

        if self.with_ext_block_table {
            for _ in 0..block_entries_total {
                push_u16(&mut out, 0);
            }
        }

        out
    }
}

fn free_slot(slots: &[(u32, u32, u16, u16, u32)], start: usize, mask: usize) -> usize {
    let mut index = start;
    loop {
        if slots[index].4 == HASH_ENTRY_EMPTY {
            return index;
        }
        index = (index + 1) & mask;
        assert_ne!(index, start, "fixture hash table is full");
    }
}

fn encode_file(file: &FixtureFile) -> (Vec<u8>, u32) {
    match file.storage {
        Storage::Stored => (file.content.clone(), FLAG_EXISTS),
        Storage::SingleUnit => (file.content.clone(), FLAG_EXISTS | FLAG_SINGLE_UNIT),
        Storage::EncryptedStored => (file.content.clone(), FLAG_EXISTS | FLAG_ENCRYPTED),
        Storage::EncryptedDeflate => (
            file.content.clone(),
            FLAG_EXISTS | FLAG_COMPRESS | FLAG_ENCRYPTED,
        ),
        Storage::Imploded => {
            // a packed offset table in front of the raw payload; the
            // decoder bails before ever inflating
            let mut blob = Vec::new();
            push_u32(&mut blob, 8);
            push_u32(&mut blob, 8 + file.content.len() as u32);
            blob.extend_from_slice(&file.content);
            (blob, FLAG_EXISTS | FLAG_IMPLODE)
        }
        Storage::Deflate => {
            let sectors: Vec<Vec<u8>> = file
                .content
                .chunks(SECTOR_SIZE)
                .map(|chunk| {
                    let compressed = zlib_compress(chunk);
                    if compressed.len() + 1 < chunk.len() {
                        let mut sector = vec![COMPRESSION_ZLIB];
                        sector.extend(compressed);
                        sector
                    } else {
                        chunk.to_vec()
                    }
                })
                .collect();

            let table_size = 4 * (sectors.len() as u32 + 1);
            let mut blob = Vec::new();
            let mut running = table_size;
            push_u32(&mut blob, running);
            for sector in &sectors {
                running += sector.len() as u32;
                push_u32(&mut blob, running);
            }
            for sector in &sectors {
                blob.extend_from_slice(sector);
            }

            (blob, FLAG_EXISTS | FLAG_COMPRESS)
        }
    }
}
