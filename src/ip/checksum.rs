use super::addr::{WireAddr32, WireAddr128, WireUint16};

// Running one's-complement sum over big-endian 16-bit words, as used by the
// IPv4 header checksum and the TCP/UDP pseudo-header checksums (RFC 1071).
#[derive(Clone, Copy)]
pub(crate) struct Checksum(u32);

impl Checksum {
    pub(crate) fn new() -> Checksum {
        Checksum(0)
    }

    pub(crate) fn from_wire(value: WireUint16) -> Checksum {
        Checksum(value.to_u16() as u32)
    }

    pub(crate) fn add_slice(&mut self, add: &[u8]) {
        // LLVM auto-vectorizes the chunked loop; an odd trailing byte is
        // treated as the high half of a zero-padded word.
        let mut iter = add.chunks_exact(2);
        let full_sum = iter
            .by_ref()
            .map(|bytes| ((bytes[0] as u32) << 8) | (bytes[1] as u32))
            .sum::<u32>();
        let remain_sum = match *iter.remainder() {
            [high] => (high as u32) << 8,
            _ => 0u32,
        };

        self.0 += full_sum + remain_sum;
    }

    // One's-complement subtraction: adding the complement of every 16-bit
    // word (RFC 1624, Eqn. 3).
    pub(crate) fn subtract_slice(&mut self, remove: &[u8]) {
        let mut iter = remove.chunks_exact(2);
        let full_sum = iter
            .by_ref()
            .map(|bytes| !(((bytes[0] as u32) << 8) | (bytes[1] as u32)) & 0x0000ffff)
            .sum::<u32>();
        let remain_sum = match *iter.remainder() {
            [high] => !((high as u32) << 8) & 0x0000ffff,
            _ => 0u32,
        };

        self.0 += full_sum + remain_sum;
    }

    #[inline]
    pub(crate) fn fold(&mut self) {
        let mut sum = self.0;
        // Two rounds always suffice: 0xffff + 0xffff = 0x1fffe folds to
        // 0xffff.
        sum = (sum >> 16) + (sum & 0x0000ffff);
        sum = (sum >> 16) + (sum & 0x0000ffff);
        self.0 = sum;
    }

    // Complemented sum, the form stored by a from-scratch computation. Must
    // fold before calling.
    pub(crate) fn value(&self) -> u16 {
        !((self.0 & 0x0000ffff) as u16)
    }

    // Folded sum without the complement, for adjusting an already-stored
    // field in place. Must fold before calling.
    pub(crate) fn wire_value(&self) -> WireUint16 {
        WireUint16::from_u16((self.0 & 0x0000ffff) as u16)
    }
}

// Incremental update of a stored checksum field after replacing the source
// and destination addresses in the summed data (RFC 1071/RFC 1624). The
// stored value is adjusted directly, without the complement round-trip, so
// the result is bit-identical to what the field already holds whenever the
// replacement is a no-op.
pub fn delta_checksum_32(
    old_checksum: WireUint16,
    old_src: WireAddr32,
    old_dst: WireAddr32,
    new_src: WireAddr32,
    new_dst: WireAddr32,
) -> WireUint16 {
    let mut checksum = Checksum::from_wire(old_checksum);
    checksum.add_slice(&old_src.octets());
    checksum.add_slice(&old_dst.octets());
    checksum.subtract_slice(&new_src.octets());
    checksum.subtract_slice(&new_dst.octets());
    checksum.fold();
    checksum.wire_value()
}

// The same update for 128-bit addresses, summed as four big-endian 32-bit
// words each.
pub fn delta_checksum_128(
    old_checksum: WireUint16,
    old_src: WireAddr128,
    old_dst: WireAddr128,
    new_src: WireAddr128,
    new_dst: WireAddr128,
) -> WireUint16 {
    let mut checksum = Checksum::from_wire(old_checksum);
    checksum.add_slice(&old_src.octets());
    checksum.add_slice(&old_dst.octets());
    checksum.subtract_slice(&new_src.octets());
    checksum.subtract_slice(&new_dst.octets());
    checksum.fold();
    checksum.wire_value()
}
