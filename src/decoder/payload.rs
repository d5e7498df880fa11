use crate::decoder::bitstream::BitReader;
use crate::decoder::modes::{
    alphanumeric::AlphanumericDecoder, kanji::KanjiDecoder, numeric::NumericDecoder,
};
use crate::decoder::reed_solomon::ReedSolomonDecoder;
use crate::decoder::tables::{char_count_bits, ec_block_info};
use crate::models::EcLevel;

const MODE_TERMINATOR: u32 = 0b0000;
const MODE_NUMERIC: u32 = 0b0001;
const MODE_ALPHANUMERIC: u32 = 0b0010;
const MODE_BYTE: u32 = 0b0100;
const MODE_ECI: u32 = 0b0111;
const MODE_KANJI: u32 = 0b1000;

/// Split interleaved codewords into blocks (short blocks first), correct
/// each block, and concatenate the data parts. Returns the data codewords
/// and the number of corrected codewords.
pub fn deinterleave_and_correct(
    codewords: &[u8],
    version: u8,
    ec_level: EcLevel,
) -> Option<(Vec<u8>, usize)> {
    let info = ec_block_info(version, ec_level)?;
    if codewords.len() != info.total_codewords {
        return None;
    }

    let mut blocks: Vec<Vec<u8>> = (0..info.num_blocks)
        .map(|b| Vec::with_capacity(info.block_data_len(b) + info.ecc_per_block))
        .collect();

    let mut iter = codewords.iter().copied();
    let long_len = info.short_block_data_len() + 1;
    for i in 0..long_len {
        for (b, block) in blocks.iter_mut().enumerate() {
            if i < info.block_data_len(b) {
                block.push(iter.next()?);
            }
        }
    }
    for _ in 0..info.ecc_per_block {
        for block in blocks.iter_mut() {
            block.push(iter.next()?);
        }
    }

    let rs = ReedSolomonDecoder::new(info.ecc_per_block);
    let mut data_out = Vec::with_capacity(info.data_codewords());
    let mut corrected = 0;
    for (b, block) in blocks.iter_mut().enumerate() {
        corrected += rs.decode(block).ok()?;
        data_out.extend_from_slice(&block[..info.block_data_len(b)]);
    }

    Some((data_out, corrected))
}

/// Parse the segment stream of the data codewords into payload bytes.
///
/// Numeric and alphanumeric segments contribute ASCII, byte segments their
/// raw bytes, kanji segments Shift JIS bytes. ECI designators are read and
/// skipped; the payload is treated as UTF-8 regardless.
pub fn parse_segments(data_codewords: &[u8], version: u8) -> Option<Vec<u8>> {
    let mut reader = BitReader::new(data_codewords);
    let mut data = Vec::new();

    while reader.remaining() >= 4 {
        let mode = reader.read_bits(4)?;
        match mode {
            MODE_TERMINATOR => break,
            MODE_ECI => {
                let first = reader.read_bits(8)?;
                if first & 0x80 != 0 {
                    let extra = if first & 0x40 != 0 { 16 } else { 8 };
                    reader.read_bits(extra)?;
                }
            }
            MODE_NUMERIC | MODE_ALPHANUMERIC | MODE_BYTE | MODE_KANJI => {
                let count_bits = char_count_bits(mode as u8, version)?;
                let count = reader.read_bits(count_bits)? as usize;
                let segment = match mode {
                    MODE_NUMERIC => NumericDecoder::decode(&mut reader, count)?,
                    MODE_ALPHANUMERIC => AlphanumericDecoder::decode(&mut reader, count)?,
                    MODE_KANJI => KanjiDecoder::decode(&mut reader, count)?,
                    _ => (0..count)
                        .map(|_| reader.read_bits(8).map(|b| b as u8))
                        .collect::<Option<Vec<u8>>>()?,
                };
                data.extend_from_slice(&segment);
            }
            _ => return None,
        }
    }

    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::reed_solomon::ReedSolomonEncoder;

    #[test]
    fn test_parse_byte_segment() {
        // 0100 | 00000100 | "demo" | 0000
        let mut bits = String::from("0100");
        bits.push_str(&format!("{:08b}", 4));
        for b in b"demo" {
            bits.push_str(&format!("{b:08b}"));
        }
        bits.push_str("0000");
        while bits.len() % 8 != 0 {
            bits.push('0');
        }
        let bytes: Vec<u8> = bits
            .as_bytes()
            .chunks(8)
            .map(|c| u8::from_str_radix(std::str::from_utf8(c).unwrap(), 2).unwrap())
            .collect();
        assert_eq!(parse_segments(&bytes, 1), Some(b"demo".to_vec()));
    }

    #[test]
    fn test_parse_mixed_segments() {
        // Numeric "01234567" from the standard's 1-M example, then padding
        let data = [
            0x10, 0x20, 0x0C, 0x56, 0x61, 0x80, 0xEC, 0x11, 0xEC, 0x11, 0xEC, 0x11, 0xEC, 0x11,
            0xEC, 0x11,
        ];
        assert_eq!(parse_segments(&data, 1), Some(b"01234567".to_vec()));
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        assert_eq!(parse_segments(&[0b1111_0000], 1), None);
    }

    #[test]
    fn test_deinterleave_two_blocks() {
        // 5-Q: blocks of 15, 15, 16, 16 data codewords, 18 ECC each
        let info = ec_block_info(5, EcLevel::Q).unwrap();
        let rs = ReedSolomonEncoder::new(info.ecc_per_block);
        let data: Vec<u8> = (0..info.data_codewords() as u32).map(|i| (i * 7 + 1) as u8).collect();

        let mut blocks = Vec::new();
        let mut offset = 0;
        for b in 0..info.num_blocks {
            let len = info.block_data_len(b);
            let chunk = &data[offset..offset + len];
            offset += len;
            blocks.push((chunk.to_vec(), rs.encode(chunk)));
        }
        let mut interleaved = Vec::new();
        for i in 0..16 {
            for (d, _) in &blocks {
                if i < d.len() {
                    interleaved.push(d[i]);
                }
            }
        }
        for i in 0..info.ecc_per_block {
            for (_, e) in &blocks {
                interleaved.push(e[i]);
            }
        }
        interleaved[3] ^= 0x55;
        interleaved[100] ^= 0x0F;

        let (out, corrected) = deinterleave_and_correct(&interleaved, 5, EcLevel::Q).unwrap();
        assert_eq!(out, data);
        assert_eq!(corrected, 2);
    }
}
