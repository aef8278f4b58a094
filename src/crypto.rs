use lazy_static::lazy_static;

use super::consts::*;

lazy_static! {
    static ref CRYPTO_TABLE: [u32; 0x500] = generate_crypto_table();

    /// Decryption key of the hash table, the hash of the literal string
    /// `"(hash table)"` with the file-key type.
    pub(crate) static ref HASH_TABLE_KEY: u32 =
        hash_string(b"(hash table)", MPQ_HASH_FILE_KEY);

    /// Decryption key of the block table, the hash of the literal string
    /// `"(block table)"` with the file-key type.
    pub(crate) static ref BLOCK_TABLE_KEY: u32 =
        hash_string(b"(block table)", MPQ_HASH_FILE_KEY);
}

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

pub(crate) fn hash_string(source: &[u8], hash_type: u32) -> u32 {
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for byte in source {
        let upper = u32::from(ASCII_UPPER_LOOKUP[*byte as usize]);

        seed1 = CRYPTO_TABLE[(hash_type + upper) as usize] ^ (seed1.overflowing_add(seed2)).0;
        seed2 = upper
            .overflowing_add(seed1)
            .0
            .overflowing_add(seed2)
            .0
            .overflowing_add(seed2 << 5)
            .0
            .overflowing_add(3)
            .0;
    }

    seed1
}

/// Computes the three hashes of a file name used to address it in an
/// archive: the bucket-index hash and the two fingerprint hashes.
///
/// The hash is case-insensitive and treats `/` and `\` as the same
/// character, so `"foo/Bar"` and `"FOO\\BAR"` produce identical triples.
///
/// [`Archive::read_file`] is equivalent to passing the result of this
/// function to [`Archive::read_file_by_hash`]; callers that look up the
/// same name repeatedly can cache the triple and skip re-hashing.
///
/// [`Archive::read_file`]: crate::Archive::read_file
/// [`Archive::read_file_by_hash`]: crate::Archive::read_file_by_hash
pub fn file_name_hash(name: &str) -> (u32, u32, u32) {
    (
        hash_string(name.as_bytes(), MPQ_HASH_TABLE_INDEX),
        hash_string(name.as_bytes(), MPQ_HASH_NAME_A),
        hash_string(name.as_bytes(), MPQ_HASH_NAME_B),
    )
}

/// Decrypts a buffer in place. The cipher operates on little-endian u32
/// words; trailing bytes that don't fill a word are left untouched, as
/// they are never encrypted in the first place.
pub(crate) fn decrypt_mpq_block(data: &mut [u8], mut key: u32) {
    let mut key_secondary: u32 = 0xEEEE_EEEE;

    for chunk in data.chunks_exact_mut(4) {
        key_secondary = key_secondary
            .overflowing_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize])
            .0;

        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
            ^ key.overflowing_add(key_secondary).0;
        chunk.copy_from_slice(&word.to_le_bytes());

        key = ((!key << 0x15).overflowing_add(0x1111_1111).0) | (key >> 0x0B);
        key_secondary = word
            .overflowing_add(key_secondary)
            .0
            .overflowing_add(key_secondary << 5)
            .0
            .overflowing_add(3)
            .0;
    }
}
