//! Huffman + bitplane decompressor (C3, §4.3).
//!
//! Decompresses one codeblock payload to signed 16-bit coefficients. The payload
//! carries an in-band Huffman tree (encoded bit-by-bit by a depth-first
//! descend/backtrack walk), a Huffman-coded byte stream interspersed with zero-run
//! escapes, and — once unpacked — one bitplane per present bit position, snake-ordered
//! in 4×4 blocks.

use crate::bit_reader::{BitReader, PaddedBuffer};
use crate::error::{DecompressError, Result};
use crate::math::sm2tc_plane;
use crate::model::Coefficient;

/// Number of bits in the fast direct-lookup Huffman table.
const HUFFMAN_FAST_BITS: u32 = 11;
const HUFFMAN_FAST_SIZE: usize = 1 << HUFFMAN_FAST_BITS;

/// Which codeblock header layout a payload uses (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressorVersion {
    /// 4-byte length prefix, bitmasks possibly trailing the decoded body.
    V1,
    /// Inline bitmasks and bitplane seektable ahead of the Huffman tree.
    V2,
}

struct Huffman {
    /// `>255` entries are `256 + lowest_matching_nonfast_index`.
    fast: Vec<u16>,
    code: [u16; 256],
    size: [u8; 256],
    nonfast_symbols: Vec<u8>,
    nonfast_code: Vec<u16>,
    nonfast_size: Vec<u8>,
}

impl Huffman {
    fn new() -> Self {
        Self {
            fast: vec![0x8000; HUFFMAN_FAST_SIZE],
            code: [0; 256],
            size: [0; 256],
            nonfast_symbols: Vec::new(),
            nonfast_code: Vec::new(),
            nonfast_size: Vec::new(),
        }
    }

    fn save_fast(&mut self, code: u32, code_width: u32, symbol: u8) {
        let duplicate_bits = HUFFMAN_FAST_BITS - code_width;
        for i in 0..(1u32 << duplicate_bits) {
            let address = ((i << code_width) | code) as usize;
            self.fast[address] = symbol as u16;
        }
    }

    fn save_nonfast(&mut self, code: u32, code_size: u8, symbol: u8) {
        let fast_mask = (1u32 << HUFFMAN_FAST_BITS) - 1;
        let prefix = (code & fast_mask) as usize;
        let old = self.fast[prefix];
        let old_lowest = if old >= 256 { (old - 256) as usize } else { 0 };
        let new_index = self.nonfast_symbols.len();
        let lowest = if self.fast[prefix] >= 256 {
            old_lowest.min(new_index)
        } else {
            new_index
        };
        self.fast[prefix] = 256 + lowest as u16;
        self.nonfast_symbols.push(symbol);
        self.nonfast_code.push(code as u16);
        self.nonfast_size.push(code_size);
    }

    /// Builds the tree in-band from `reader`, returning once the encoding's
    /// backtrack-to-no-zero-remaining condition terminates it.
    fn build(reader: &mut BitReader<'_>, block_size_in_bits: usize) -> Result<Self> {
        let mut h = Self::new();
        let mut code_size: u32 = 0;
        let mut code: u32 = 0;

        loop {
            if reader.bit_pos() >= block_size_in_bits {
                return Err(DecompressError::HuffmanTableOverrun.into());
            }

            let mut blob = reader.peek_bits();
            let mut bits_to_advance: usize = 1;
            let mut is_leaf = blob & 1 != 0;
            while !is_leaf {
                bits_to_advance += 1;
                blob >>= 1;
                is_leaf = blob & 1 != 0;
                code_size += 1;
            }
            blob >>= 1;

            let symbol = blob as u8;
            h.code[symbol as usize] = code as u16;
            h.size[symbol as usize] = code_size as u8;

            if code_size <= HUFFMAN_FAST_BITS {
                h.save_fast(code, code_size, symbol);
            } else {
                h.save_nonfast(code, code_size as u8, symbol);
            }

            bits_to_advance += 8;
            reader.advance(bits_to_advance);

            if code_size == 0 {
                break;
            }

            let mut code_high_bit = 1u32 << (code_size - 1);
            let mut found_zero = (!code) & code_high_bit != 0;
            while !found_zero {
                code_size -= 1;
                if code_size == 0 {
                    break;
                }
                code &= code_high_bit - 1;
                code_high_bit >>= 1;
                found_zero = (!code) & code_high_bit != 0;
            }
            code |= code_high_bit;

            if code_size == 0 {
                break;
            }
        }

        Ok(h)
    }

    fn lookup(&self, blob: u64) -> Option<(u8, u8)> {
        let fast_mask = (1u64 << HUFFMAN_FAST_BITS) - 1;
        let fast_index = (blob & fast_mask) as usize;
        let c = self.fast[fast_index];
        if c <= 255 {
            let symbol = c as u8;
            let mut size = self.size[symbol as usize];
            if size == 0 {
                size = 1;
            }
            return Some((symbol, size));
        }
        let lowest = (c - 256) as usize;
        for i in lowest..self.nonfast_symbols.len() {
            let test_size = self.nonfast_size[i];
            let mask = if test_size >= 64 {
                u64::MAX
            } else {
                (1u64 << test_size) - 1
            };
            if (blob & mask) as u16 == self.nonfast_code[i] {
                return Some((self.nonfast_symbols[i], test_size));
            }
        }
        None
    }
}

/// Decompresses one codeblock payload to `coefficient.plane_count()` planes of
/// `block_width * block_height` signed 16-bit samples each, concatenated in colour
/// order. Payloads of 8 bytes or fewer are treated as empty and decode to all zero.
pub fn decompress_codeblock(
    payload: &[u8],
    block_width: u32,
    block_height: u32,
    coefficient: Coefficient,
    version: CompressorVersion,
) -> Result<Vec<i16>> {
    let plane_samples = (block_width * block_height) as usize;
    let coeff_count = coefficient.plane_count();
    let total_samples = plane_samples * coeff_count;

    if payload.len() <= 8 {
        return Ok(vec![0i16; total_samples]);
    }

    let padded = PaddedBuffer::new(payload);
    let mut reader = BitReader::new(&padded);
    let block_size_in_bits = payload.len() * 8;

    let mut bitmasks = [0xFFFFu32; 3];
    let mut serialized_length: u32;

    match version {
        CompressorVersion::V1 => {
            serialized_length = reader.read_bits(32);
        }
        CompressorVersion::V2 => {
            let mut total_mask_bits = 0u32;
            for mask in bitmasks.iter_mut().take(coeff_count) {
                *mask = reader.read_bits(16);
                total_mask_bits += mask.count_ones();
            }
            serialized_length = total_mask_bits * (plane_samples as u32 / 8);
        }
    }

    if serialized_length as usize > 2 * total_samples * 2 {
        return Err(DecompressError::SerializedLengthExceedsExpected.into());
    }

    let zerorun_symbol = reader.read_bits(8) as u8;
    let counter_width = reader.read_bits(8);

    if matches!(version, CompressorVersion::V2) {
        let total_mask_bits: u32 = bitmasks.iter().take(coeff_count).map(|m| m.count_ones()).sum();
        let floor_log2 = 31 - serialized_length.max(1).leading_zeros();
        let bitplane_ptr_bits = floor_log2 + 5;
        for _ in 0..total_mask_bits {
            reader.advance(bitplane_ptr_bits as usize);
        }
    }

    let huffman = Huffman::build(&mut reader, block_size_in_bits)?;

    let mut zerorun_code_size = huffman.size[zerorun_symbol as usize];
    if zerorun_code_size == 0 {
        zerorun_code_size = 1;
    }
    let zerorun_code = huffman.code[zerorun_symbol as usize];
    let zerorun_code_mask = (1u64 << zerorun_code_size) - 1;
    let counter_mask = if counter_width >= 64 {
        u64::MAX
    } else {
        (1u64 << counter_width) - 1
    };

    let mut decoded: Vec<u8> = Vec::with_capacity(serialized_length as usize);

    while reader.bit_pos() < block_size_in_bits && decoded.len() < serialized_length as usize {
        let blob = reader.peek_bits();
        let (symbol, code_size) = huffman
            .lookup(blob)
            .ok_or(DecompressError::HuffmanSymbolNotFound)?;
        let mut blob = blob >> code_size;
        reader.advance(code_size as usize);

        if symbol == zerorun_symbol {
            let mut numzeroes = (blob & counter_mask) as u32;
            reader.advance(counter_width as usize);

            if numzeroes > 0 {
                if matches!(version, CompressorVersion::V2) {
                    numzeroes += 1;
                }
                loop {
                    if decoded.len() as u32 + numzeroes >= serialized_length {
                        break;
                    }
                    blob = reader.peek_bits();
                    let next_code = (blob & zerorun_code_mask) as u16;
                    if next_code == zerorun_code {
                        blob >>= zerorun_code_size;
                        let mut extra = (blob & counter_mask) as u32;
                        if matches!(version, CompressorVersion::V2) {
                            extra += 1;
                        }
                        numzeroes = (numzeroes << counter_width) | extra;
                        reader.advance(zerorun_code_size as usize + counter_width as usize);
                    } else {
                        break;
                    }
                }
                let remaining = serialized_length - decoded.len() as u32;
                let to_write = remaining.min(numzeroes);
                decoded.resize(decoded.len() + to_write as usize, 0);
            } else {
                decoded.push(symbol);
            }
        } else {
            decoded.push(symbol);
        }
    }

    if decoded.len() as u32 != serialized_length {
        return Err(DecompressError::SerializedLengthMismatch {
            expected: serialized_length,
            actual: decoded.len() as u32,
        }
        .into());
    }

    let bytes_per_bitplane = plane_samples / 8;

    if matches!(version, CompressorVersion::V1) {
        let expected_length = total_mask_bits_v1(&bitmasks, coeff_count) * bytes_per_bitplane as u32;
        if decoded.len() < expected_length as usize {
            match coeff_count {
                1 => {
                    let tail = &decoded[decoded.len() - 2..];
                    bitmasks[0] = u16::from_le_bytes([tail[0], tail[1]]) as u32;
                }
                3 => {
                    let tail = &decoded[decoded.len() - 6..];
                    bitmasks[0] = u16::from_le_bytes([tail[0], tail[1]]) as u32;
                    bitmasks[1] = u16::from_le_bytes([tail[2], tail[3]]) as u32;
                    bitmasks[2] = u16::from_le_bytes([tail[4], tail[5]]) as u32;
                }
                _ => unreachable!(),
            }
        }
    }

    let mut coeff_buffer = vec![0u16; total_samples];
    let mut out_buffer = vec![0u16; total_samples];
    let mut compressed_bitplane_index = 0usize;
    let area_stride_x = (block_width / 4) as usize;

    for c in 0..coeff_count {
        let mut bitmask = bitmasks[c];
        let current_coeff = &mut coeff_buffer[c * plane_samples..(c + 1) * plane_samples];
        let mut bit = 0u32;
        while bitmask != 0 {
            if bitmask & 1 != 0 {
                let bitplane = &decoded[compressed_bitplane_index * bytes_per_bitplane
                    ..(compressed_bitplane_index + 1) * bytes_per_bitplane];
                let shift_amount = if bit == 0 { 15 } else { bit - 1 };
                for (j, &b) in bitplane.iter().enumerate() {
                    if b == 0 {
                        continue;
                    }
                    let base = j * 8;
                    for k in 0..8 {
                        let bit_val = (b >> k) & 1;
                        current_coeff[base + k] |= (bit_val as u16) << shift_amount;
                    }
                }
                compressed_bitplane_index += 1;
            }
            bitmask >>= 1;
            bit += 1;
        }

        if bit > 0 {
            let current_out = &mut out_buffer[c * plane_samples..(c + 1) * plane_samples];
            for area_index in 0..(plane_samples / 16) {
                let area_base = area_index * 16;
                let area_x = (area_index % area_stride_x) * 4;
                let area_y = (area_index / area_stride_x) * 4;
                for row in 0..4 {
                    let src = &current_coeff[area_base + row * 4..area_base + row * 4 + 4];
                    let dst_row = area_y + row;
                    let dst_start = dst_row * block_width as usize + area_x;
                    current_out[dst_start..dst_start + 4].copy_from_slice(src);
                }
            }
            sm2tc_plane(current_out);
        }
    }

    Ok(out_buffer.into_iter().map(|v| v as i16).collect())
}

fn total_mask_bits_v1(bitmasks: &[u32; 3], coeff_count: usize) -> u32 {
    bitmasks.iter().take(coeff_count).map(|m| m.count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_decodes_to_zero() {
        let payload = [0u8; 8];
        let out = decompress_codeblock(&payload, 8, 8, Coefficient::Ll, CompressorVersion::V1)
            .unwrap();
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn tiny_payload_under_eight_bytes_decodes_to_zero() {
        let payload = [1, 2, 3];
        let out = decompress_codeblock(&payload, 4, 4, Coefficient::Ll, CompressorVersion::V1)
            .unwrap();
        assert_eq!(out, vec![0i16; 16]);
    }
}
