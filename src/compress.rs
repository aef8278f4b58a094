use super::consts::*;
use super::error::Error;

/// Inflates a packed sector into `dst`.
///
/// The first byte of `src` is a bitmask naming the codecs the sector went
/// through; the rest is the payload. On success exactly `dst.len()` bytes
/// have been written. Codecs are undone in the reverse of the order they
/// were applied, so bzip2 runs before zlib when both bits are set.
pub(crate) fn decompress_multi(dst: &mut [u8], src: &[u8]) -> Result<(), Error> {
    if src.is_empty() {
        return Err(Error::InvalidArchive);
    }

    let compression_type = src[0];

    if compression_type & COMPRESSION_IMA_ADCPM_MONO != 0 {
        return Err(Error::UnsupportedCompression {
            kind: "IMA ADPCM Mono".to_string(),
        });
    }

    if compression_type & COMPRESSION_IMA_ADCPM_STEREO != 0 {
        return Err(Error::UnsupportedCompression {
            kind: "IMA ADPCM Stereo".to_string(),
        });
    }

    if compression_type & COMPRESSION_HUFFMAN != 0 {
        return Err(Error::UnsupportedCompression {
            kind: "Huffman".to_string(),
        });
    }

    if compression_type & COMPRESSION_SPARSE != 0 {
        return Err(Error::UnsupportedCompression {
            kind: "Sparse".to_string(),
        });
    }

    if compression_type & COMPRESSION_PKWARE != 0 {
        return Err(Error::UnsupportedCompression {
            kind: "PKWare DCL".to_string(),
        });
    }

    let mut buf: Vec<u8> = src[1..].to_vec();

    if compression_type & COMPRESSION_BZIP2 != 0 {
        let mut decompressed = vec![0u8; dst.len()];
        let mut decompressor = bzip2::Decompress::new(false);
        let status = decompressor.decompress(&buf, &mut decompressed);

        match status {
            Ok(bzip2::Status::Ok) | Ok(bzip2::Status::StreamEnd) => {}
            _ => return Err(Error::InvalidArchive),
        }

        decompressed.resize(decompressor.total_out() as usize, 0);
        buf = decompressed;
    }

    if compression_type & COMPRESSION_ZLIB != 0 {
        let mut decompressed = vec![0u8; dst.len()];
        let mut decompressor = flate2::Decompress::new(true);
        let status =
            decompressor.decompress(&buf, &mut decompressed, flate2::FlushDecompress::Finish);

        if !(status.is_ok() && status.unwrap() != flate2::Status::BufError) {
            return Err(Error::InvalidArchive);
        }

        decompressed.resize(decompressor.total_out() as usize, 0);
        buf = decompressed;
    }

    if buf.len() != dst.len() {
        return Err(Error::InvalidArchive);
    }

    dst.copy_from_slice(&buf);
    Ok(())
}
