//! A packed list: a single contiguous byte buffer storing a sequence of
//! small typed values (signed integers and byte strings), in the spirit of
//! Redis's ziplist — no per-element allocation, a sentinel entry to make
//! prepending uniform, and a prev-length field on every entry so the list
//! can be walked backward without extra bookkeeping.
//!
//! Layout (all multi-byte integers big-endian):
//!
//! ```text
//! [ total_bytes : u32 ] [ tail_offset : u32 ] [ count : u16 ]
//! [ sentinel_entry ] [ entry_1 ] ... [ entry_n ] [ 0xff ]
//! ```
//!
//! Every mutation reallocates and swaps in a new buffer rather than editing
//! in place — the cascading prev-length updates on insert/delete touch a
//! variable number of neighboring entries, so there is no way to resize one
//! entry without a fresh allocation anyway. This keeps mutation atomic from
//! the caller's view: either the new buffer is fully built and installed, or
//! an error is returned and the old buffer is untouched.

pub mod entry;

use entry::{decode_entry, encode_prev_len, encode_value, DecodedEntry, Value, TERMINATOR};

use crate::error::{Error, Result};

const HEADER_LEN: usize = 4 + 4 + 2;
const SENTINEL_OFFSET: usize = HEADER_LEN;
const SENTINEL_LEN: usize = 2;
const FIRST_ENTRY_OFFSET: usize = SENTINEL_OFFSET + SENTINEL_LEN;

/// A contiguous byte buffer storing a sequence of small integers and byte
/// strings, exactly as described by the on-disk format above.
#[derive(Debug, Clone)]
pub struct PackedList {
    buf: Vec<u8>,
}

impl PackedList {
    /// Produces an empty 13-byte buffer: header, sentinel, terminator.
    pub fn new() -> Self {
        let mut buf = vec![0u8; FIRST_ENTRY_OFFSET + 1];
        buf[FIRST_ENTRY_OFFSET] = TERMINATOR;
        let mut pl = PackedList { buf };
        pl.set_total_bytes(pl.buf.len() as u32);
        pl.set_tail_offset(SENTINEL_OFFSET as u32);
        pl.set_count(0);
        pl.buf[SENTINEL_OFFSET] = 0x00;
        pl.buf[SENTINEL_OFFSET + 1] = 0xf0;
        pl
    }

    /// Reconstructs a `PackedList` from a raw buffer, validating the
    /// header, sentinel, terminator, and every entry between them.
    ///
    /// Walks the full chain via [`decode_entry`] rather than trusting the
    /// header fields alone: a buffer can satisfy the header checks yet carry
    /// a corrupted entry body (a stray encoding byte, a length field that
    /// points past the buffer), and that must surface here as
    /// [`Error::CorruptBuffer`] rather than panic later out of `iter()`.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        if buf.len() < FIRST_ENTRY_OFFSET + 1 {
            return Err(Error::CorruptBuffer("buffer shorter than empty-list header".into()));
        }
        let pl = PackedList { buf };
        if pl.total_bytes() as usize != pl.buf.len() {
            return Err(Error::CorruptBuffer("total_bytes does not match buffer length".into()));
        }
        if pl.buf[pl.buf.len() - 1] != TERMINATOR {
            return Err(Error::CorruptBuffer("missing list terminator".into()));
        }
        if pl.buf[SENTINEL_OFFSET] != 0x00 || pl.buf[SENTINEL_OFFSET + 1] != 0xf0 {
            return Err(Error::CorruptBuffer("sentinel entry is malformed".into()));
        }
        let tail = pl.tail_offset() as usize;
        if tail < SENTINEL_OFFSET || tail >= pl.buf.len() {
            return Err(Error::CorruptBuffer("tail_offset out of bounds".into()));
        }

        let mut offset = FIRST_ENTRY_OFFSET;
        let mut seen = 0u16;
        while pl.buf[offset] != TERMINATOR {
            let entry = pl.decode_at(offset)?;
            offset += entry.total_len();
            if offset >= pl.buf.len() {
                return Err(Error::CorruptBuffer("entry runs past end of buffer".into()));
            }
            seen += 1;
        }
        if offset != pl.buf.len() - 1 {
            return Err(Error::CorruptBuffer("entry chain does not reach terminator".into()));
        }
        if seen != pl.count() {
            return Err(Error::CorruptBuffer("count does not match number of entries".into()));
        }

        Ok(pl)
    }

    /// The raw wire buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn total_bytes(&self) -> u32 {
        u32::from_be_bytes(self.buf[0..4].try_into().unwrap())
    }

    pub fn tail_offset(&self) -> u32 {
        u32::from_be_bytes(self.buf[4..8].try_into().unwrap())
    }

    pub fn count(&self) -> u16 {
        u16::from_be_bytes(self.buf[8..10].try_into().unwrap())
    }

    fn set_total_bytes(&mut self, v: u32) {
        self.buf[0..4].copy_from_slice(&v.to_be_bytes());
    }

    fn set_tail_offset(&mut self, v: u32) {
        self.buf[4..8].copy_from_slice(&v.to_be_bytes());
    }

    fn set_count(&mut self, v: u16) {
        self.buf[8..10].copy_from_slice(&v.to_be_bytes());
    }

    fn decode_at(&self, offset: usize) -> Result<DecodedEntry> {
        decode_entry(&self.buf, offset)
    }

    /// Appends `value` at the tail.
    pub fn push(&mut self, value: Value) -> Result<()> {
        let position = self.tail_offset() as usize;
        self.insert_after(position, value)
    }

    /// Inserts `value` immediately after the entry starting at `position`
    /// (the sentinel, at offset 10, counts as a valid position — inserting
    /// there prepends).
    pub fn insert_after(&mut self, position: usize, value: Value) -> Result<()> {
        if position >= self.buf.len() || self.buf[position] == TERMINATOR {
            return Err(Error::CorruptBuffer("insert position is not a real entry".into()));
        }
        let p_entry = self.decode_at(position)?;
        let p_total_len = p_entry.total_len();

        let enc_data = encode_value(&value)?;
        let prev_field = encode_prev_len(p_total_len as u32);
        let e_total_len = prev_field.len() + enc_data.len();

        // Measure pass: walk the cascade of entries whose prev-length field
        // must grow from 1 to 5 bytes.
        struct Grown {
            orig_offset: usize,
            entry: DecodedEntry,
            prev_len_to_write: u32,
        }
        let mut grown: Vec<Grown> = Vec::new();
        let mut cur_prev_len = e_total_len as u32;
        let mut cur_offset = position + p_total_len;
        loop {
            if self.buf[cur_offset] == TERMINATOR {
                break;
            }
            let s = self.decode_at(cur_offset)?;
            if s.prev_field_size == 5 || cur_prev_len <= 0xfd {
                break;
            }
            let next_prev_len = s.total_len() as u32 + 4;
            grown.push(Grown {
                orig_offset: cur_offset,
                prev_len_to_write: cur_prev_len,
                entry: s,
            });
            cur_offset += grown.last().unwrap().entry.total_len();
            cur_prev_len = next_prev_len;
        }
        let k = grown.len();

        let first_successor_was_tail = self.buf[position + p_total_len] == TERMINATOR;
        let old_total = self.buf.len();
        let new_total = old_total + e_total_len + 4 * k;
        let mut new_buf = vec![0u8; new_total];

        // Copy everything through the end of P unchanged — the new entry is
        // spliced in right after it, not over it.
        let copy_through = position + p_total_len;
        new_buf[..copy_through].copy_from_slice(&self.buf[..copy_through]);
        let mut w = copy_through;
        new_buf[w..w + prev_field.len()].copy_from_slice(&prev_field);
        w += prev_field.len();
        new_buf[w..w + enc_data.len()].copy_from_slice(&enc_data);
        w += enc_data.len();

        let mut r = copy_through;
        for g in &grown {
            new_buf[w] = 0xfe;
            new_buf[w + 1..w + 5].copy_from_slice(&g.prev_len_to_write.to_be_bytes());
            let payload_start = g.orig_offset + g.entry.prev_field_size;
            let payload_len = g.entry.encoding_len + g.entry.data_len;
            new_buf[w + 5..w + 5 + payload_len]
                .copy_from_slice(&self.buf[payload_start..payload_start + payload_len]);
            w += 5 + payload_len;
            r += g.entry.total_len();
        }

        if self.buf[r] != TERMINATOR {
            let term = self.decode_at(r)?;
            let term_value = cur_prev_len;
            if term.prev_field_size == 5 {
                new_buf[w] = 0xfe;
                new_buf[w + 1..w + 5].copy_from_slice(&term_value.to_be_bytes());
            } else {
                new_buf[w] = term_value as u8;
            }
            let payload_start = r + term.prev_field_size;
            let payload_len = term.encoding_len + term.data_len;
            new_buf[w + term.prev_field_size..w + term.prev_field_size + payload_len]
                .copy_from_slice(&self.buf[payload_start..payload_start + payload_len]);
            w += term.total_len();
            r += term.total_len();
        }

        new_buf[w..].copy_from_slice(&self.buf[r..]);

        let old_tail = self.tail_offset();
        self.buf = new_buf;
        self.set_total_bytes(new_total as u32);
        if first_successor_was_tail {
            self.set_tail_offset(copy_through as u32);
        } else {
            self.set_tail_offset(old_tail + (e_total_len + 4 * k) as u32);
        }
        self.set_count(self.count() + 1);

        Ok(())
    }

    /// Removes the first entry whose decoded payload equals `value`,
    /// scanning from the first real entry. Returns whether one was removed.
    pub fn delete_first(&mut self, value: &Value) -> Result<bool> {
        let mut offset = FIRST_ENTRY_OFFSET;
        loop {
            if self.buf[offset] == TERMINATOR {
                return Ok(false);
            }
            let entry = self.decode_at(offset)?;
            if &entry.value == value {
                self.delete_at(offset, &entry)?;
                return Ok(true);
            }
            offset += entry.total_len();
        }
    }

    fn delete_at(&mut self, offset: usize, entry: &DecodedEntry) -> Result<()> {
        let e_total_len = entry.total_len();
        let prev_len_of_e = entry.prev_len;

        struct Shrunk {
            orig_offset: usize,
            entry: DecodedEntry,
            prev_len_to_write: u32,
        }
        let mut shrunk: Vec<Shrunk> = Vec::new();
        let mut cur_prev_len = prev_len_of_e;
        let mut cur_offset = offset + e_total_len;
        loop {
            if self.buf[cur_offset] == TERMINATOR {
                break;
            }
            let s = self.decode_at(cur_offset)?;
            if s.prev_field_size != 5 || cur_prev_len > 0xfd {
                break;
            }
            let next_prev_len = s.total_len() as u32 - 4;
            shrunk.push(Shrunk {
                orig_offset: cur_offset,
                prev_len_to_write: cur_prev_len,
                entry: s,
            });
            cur_offset += shrunk.last().unwrap().entry.total_len();
            cur_prev_len = next_prev_len;
        }
        let k = shrunk.len();

        let successor_was_tail = self.buf[offset + e_total_len] == TERMINATOR;
        let old_total = self.buf.len();
        let new_total = old_total - e_total_len - 4 * k;
        let mut new_buf = vec![0u8; new_total];

        new_buf[..offset].copy_from_slice(&self.buf[..offset]);
        let mut w = offset;
        let mut r = offset + e_total_len;

        for s in &shrunk {
            new_buf[w] = s.prev_len_to_write as u8;
            let payload_start = s.orig_offset + s.entry.prev_field_size;
            let payload_len = s.entry.encoding_len + s.entry.data_len;
            new_buf[w + 1..w + 1 + payload_len]
                .copy_from_slice(&self.buf[payload_start..payload_start + payload_len]);
            w += 1 + payload_len;
            r += s.entry.total_len();
        }

        if self.buf[r] != TERMINATOR {
            let term = self.decode_at(r)?;
            let term_value = cur_prev_len;
            if term.prev_field_size == 5 {
                new_buf[w] = 0xfe;
                new_buf[w + 1..w + 5].copy_from_slice(&term_value.to_be_bytes());
            } else {
                new_buf[w] = term_value as u8;
            }
            let payload_start = r + term.prev_field_size;
            let payload_len = term.encoding_len + term.data_len;
            new_buf[w + term.prev_field_size..w + term.prev_field_size + payload_len]
                .copy_from_slice(&self.buf[payload_start..payload_start + payload_len]);
            w += term.total_len();
            r += term.total_len();
        }

        new_buf[w..].copy_from_slice(&self.buf[r..]);

        let old_tail = self.tail_offset();
        self.buf = new_buf;
        self.set_total_bytes(new_total as u32);
        if successor_was_tail {
            self.set_tail_offset((offset - prev_len_of_e as usize) as u32);
        } else {
            self.set_tail_offset(old_tail - (e_total_len + 4 * k) as u32);
        }
        self.set_count(self.count() - 1);

        Ok(())
    }

    /// Decodes the `index`-th real entry (0-based), walking forward from
    /// the sentinel. O(n) in the number of entries.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.iter().nth(index)
    }

    /// A forward iterator over decoded values, sentinel excluded.
    pub fn iter(&self) -> PackedListIter<'_> {
        PackedListIter {
            buf: &self.buf,
            offset: FIRST_ENTRY_OFFSET,
        }
    }
}

impl Default for PackedList {
    fn default() -> Self {
        PackedList::new()
    }
}

/// Forward iterator over a [`PackedList`]'s decoded values.
pub struct PackedListIter<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for PackedListIter<'a> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.buf[self.offset] == TERMINATOR {
            return None;
        }
        let entry = decode_entry(self.buf, self.offset).expect("well-formed packed list");
        self.offset += entry.total_len();
        Some(entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytestr::ByteStr;

    #[test]
    fn new_list_matches_fixed_empty_buffer() {
        let pl = PackedList::new();
        assert_eq!(
            pl.as_bytes(),
            &[0x00, 0x00, 0x00, 0x0d, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00, 0xf0, 0xff]
        );
        assert_eq!(pl.count(), 0);
        assert_eq!(pl.total_bytes(), 13);
        assert_eq!(pl.tail_offset(), 10);
    }

    // Scenario 4 from spec §8.
    #[test]
    fn push_int_13() {
        let mut pl = PackedList::new();
        pl.push(Value::Int(13)).unwrap();
        assert_eq!(
            pl.as_bytes(),
            &[
                0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x0c, 0x00, 0x01, 0x00, 0xf0, 0x02,
                0xc0, 0x0d, 0xff,
            ]
        );
    }

    // Scenario 5 from spec §8.
    #[test]
    fn push_empty_string() {
        let mut pl = PackedList::new();
        pl.push(Value::Bytes(ByteStr::from(&b""[..]))).unwrap();
        assert_eq!(
            pl.as_bytes(),
            &[
                0x00, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x00, 0x0c, 0x00, 0x01, 0x00, 0xf0, 0x02,
                0x00, 0xff,
            ]
        );
    }

    // §6.1 fixture: [int64(0), ByteStr("")].
    #[test]
    fn fixture_int_zero_then_empty_string() {
        let mut pl = PackedList::new();
        pl.push(Value::Int(0)).unwrap();
        pl.push(Value::Bytes(ByteStr::from(&b""[..]))).unwrap();
        assert_eq!(
            pl.as_bytes(),
            &[
                0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x02, 0x00, 0xf0, 0x02,
                0xf0, 0x02, 0x00, 0xff,
            ]
        );
    }

    // §6.1 fixture: [int64(13), ByteStr("\x11\x12")].
    #[test]
    fn fixture_int_13_then_two_bytes() {
        let mut pl = PackedList::new();
        pl.push(Value::Int(13)).unwrap();
        pl.push(Value::Bytes(ByteStr::new(vec![0x11, 0x12]))).unwrap();
        assert_eq!(
            pl.as_bytes(),
            &[
                0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x0f, 0x00, 0x02, 0x00, 0xf0, 0x02,
                0xc0, 0x0d, 0x03, 0x02, 0x11, 0x12, 0xff,
            ]
        );
    }

    // Scenario 6 from spec §8: cascade growth on insert-after-sentinel.
    #[test]
    fn cascade_grows_successor_prev_field() {
        let mut pl = PackedList::new();
        pl.push(Value::Int(1)).unwrap();
        pl.push(Value::Int(2)).unwrap();
        let before_len = pl.as_bytes().len();

        let big = ByteStr::new(vec![0x7a; 258]);
        pl.insert_after(SENTINEL_OFFSET, Value::Bytes(big)).unwrap();

        // The new entry (prev=1B, encoding=2B, data=258B) plus the 4-byte
        // growth of the entry that used to follow the sentinel.
        let e_len = 1 + 2 + 258;
        assert_eq!(pl.as_bytes().len(), before_len + e_len + 4);
        assert_eq!(pl.count(), 3);

        let values: Vec<Value> = pl.iter().collect();
        assert_eq!(values[0], Value::Bytes(ByteStr::new(vec![0x7a; 258])));
        assert_eq!(values[1], Value::Int(1));
        assert_eq!(values[2], Value::Int(2));
    }

    // Scenario 7 from spec §8.
    #[test]
    fn delete_first_matching_and_miss() {
        let mut pl = PackedList::new();
        pl.push(Value::Int(13)).unwrap();
        pl.push(Value::Bytes(ByteStr::new(vec![0xff, 0xff]))).unwrap();

        assert!(pl.delete_first(&Value::Int(13)).unwrap());
        let values: Vec<Value> = pl.iter().collect();
        assert_eq!(values, vec![Value::Bytes(ByteStr::new(vec![0xff, 0xff]))]);

        assert!(!pl.delete_first(&Value::Int(12)).unwrap());
        let values: Vec<Value> = pl.iter().collect();
        assert_eq!(values, vec![Value::Bytes(ByteStr::new(vec![0xff, 0xff]))]);
    }

    #[test]
    fn insert_then_delete_restores_header_counters() {
        let mut pl = PackedList::new();
        pl.push(Value::Int(1)).unwrap();
        pl.push(Value::Int(2)).unwrap();
        let total_before = pl.total_bytes();
        let count_before = pl.count();

        let big = ByteStr::new(vec![0x11; 400]);
        pl.insert_after(SENTINEL_OFFSET, Value::Bytes(big.clone())).unwrap();
        assert!(pl.delete_first(&Value::Bytes(big)).unwrap());

        assert_eq!(pl.total_bytes(), total_before);
        assert_eq!(pl.count(), count_before);
        assert_eq!(pl.total_bytes() as usize, pl.as_bytes().len());
    }

    #[test]
    fn header_consistency_after_many_mixed_ops() {
        let mut pl = PackedList::new();
        for i in 0..40i64 {
            if i % 3 == 0 {
                pl.push(Value::Bytes(ByteStr::new(vec![b'a'; i as usize % 70]))).unwrap();
            } else {
                pl.push(Value::Int(i)).unwrap();
            }
        }
        assert_eq!(pl.count() as usize, 40);
        assert_eq!(pl.total_bytes() as usize, pl.as_bytes().len());
        assert_eq!(*pl.as_bytes().last().unwrap(), TERMINATOR);

        let tail = pl.tail_offset() as usize;
        assert!(pl.as_bytes()[tail] != TERMINATOR);
        let tail_entry = pl.decode_at(tail).unwrap();
        assert_eq!(tail + tail_entry.total_len() + 1, pl.as_bytes().len());

        for _ in 0..10 {
            pl.delete_first(&Value::Int(1)).ok();
        }
        assert_eq!(pl.total_bytes() as usize, pl.as_bytes().len());
        assert_eq!(*pl.as_bytes().last().unwrap(), TERMINATOR);
    }

    #[test]
    fn from_bytes_round_trips_as_bytes() {
        let mut pl = PackedList::new();
        pl.push(Value::Int(42)).unwrap();
        pl.push(Value::Bytes(ByteStr::from("hello"))).unwrap();

        let reloaded = PackedList::from_bytes(pl.as_bytes().to_vec()).unwrap();
        assert_eq!(reloaded.as_bytes(), pl.as_bytes());
        let values: Vec<Value> = reloaded.iter().collect();
        assert_eq!(values, vec![Value::Int(42), Value::Bytes(ByteStr::from("hello"))]);
    }

    #[test]
    fn from_bytes_rejects_bad_terminator() {
        let mut bytes = PackedList::new().as_bytes().to_vec();
        *bytes.last_mut().unwrap() = 0x00;
        assert!(PackedList::from_bytes(bytes).is_err());
    }

    #[test]
    fn from_bytes_rejects_length_mismatch() {
        let mut bytes = PackedList::new().as_bytes().to_vec();
        bytes[0] = 0xff;
        assert!(PackedList::from_bytes(bytes).is_err());
    }

    #[test]
    fn from_bytes_rejects_corrupt_entry_body() {
        let mut pl = PackedList::new();
        pl.push(Value::Int(1)).unwrap();
        pl.push(Value::Int(2)).unwrap();
        let mut bytes = pl.as_bytes().to_vec();

        // Stomp the first real entry's encoding byte with an unrecognized
        // pattern (0xc1 is in the 0xc0..0xd0 reserved gap). The header
        // fields (total_bytes, terminator, sentinel, tail_offset) are all
        // still consistent, so only a full entry-chain walk catches this.
        bytes[FIRST_ENTRY_OFFSET + 1] = 0xc1;
        assert!(matches!(
            PackedList::from_bytes(bytes),
            Err(Error::CorruptBuffer(_))
        ));
    }
}
