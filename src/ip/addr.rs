use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

// Host-order addresses support arithmetic and comparison on any platform;
// wire-order values hold the exact bytes as they appear in the packet.
// Keeping the two as separate types turns byte-order mistakes into compile
// errors instead of corrupted checksums.

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct HostAddr32(u32);

impl HostAddr32 {
    pub fn from_u32(value: u32) -> HostAddr32 {
        HostAddr32(value)
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }

    pub fn to_wire(self) -> WireAddr32 {
        WireAddr32(self.0.to_be_bytes())
    }

    // IPv4-mapped IPv6 address, ::ffff:a.b.c.d.
    pub fn to_mapped_v6(self) -> HostAddr128 {
        HostAddr128((0xffffu128 << 32) | self.0 as u128)
    }
}

impl From<Ipv4Addr> for HostAddr32 {
    fn from(addr: Ipv4Addr) -> HostAddr32 {
        HostAddr32(u32::from(addr))
    }
}

impl From<HostAddr32> for Ipv4Addr {
    fn from(addr: HostAddr32) -> Ipv4Addr {
        Ipv4Addr::from(addr.0)
    }
}

impl fmt::Display for HostAddr32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv4Addr::from(self.0).fmt(f)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct HostAddr128(u128);

impl HostAddr128 {
    pub fn from_u128(value: u128) -> HostAddr128 {
        HostAddr128(value)
    }

    pub fn to_u128(self) -> u128 {
        self.0
    }

    pub fn to_wire(self) -> WireAddr128 {
        let mut words = [0u32; 4];
        for (i, word) in words.iter_mut().enumerate() {
            *word = (self.0 >> (96 - i * 32)) as u32;
        }
        WireAddr128::from_words(words)
    }

    // Unconditional truncation to the low 32 bits; the caller is responsible
    // for knowing the address is IPv4-mapped.
    pub fn truncate_to_v4(self) -> HostAddr32 {
        HostAddr32(self.0 as u32)
    }
}

impl From<Ipv6Addr> for HostAddr128 {
    fn from(addr: Ipv6Addr) -> HostAddr128 {
        HostAddr128(u128::from(addr))
    }
}

impl From<HostAddr128> for Ipv6Addr {
    fn from(addr: HostAddr128) -> Ipv6Addr {
        Ipv6Addr::from(addr.0)
    }
}

impl fmt::Display for HostAddr128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv6Addr::from(self.0).fmt(f)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WireAddr32([u8; 4]);

impl WireAddr32 {
    pub fn from_octets(octets: [u8; 4]) -> WireAddr32 {
        WireAddr32(octets)
    }

    pub fn octets(&self) -> [u8; 4] {
        self.0
    }

    pub fn to_host(self) -> HostAddr32 {
        HostAddr32(u32::from_be_bytes(self.0))
    }
}

impl fmt::Display for WireAddr32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv4Addr::from(self.0).fmt(f)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WireAddr128([u8; 16]);

impl WireAddr128 {
    pub fn from_octets(octets: [u8; 16]) -> WireAddr128 {
        WireAddr128(octets)
    }

    pub fn octets(&self) -> [u8; 16] {
        self.0
    }

    // The four 32-bit words as they appear on the wire, most significant
    // first, regardless of host endianness.
    pub fn words(&self) -> [u32; 4] {
        let mut words = [0u32; 4];
        for (i, word) in words.iter_mut().enumerate() {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&self.0[i * 4..i * 4 + 4]);
            *word = u32::from_be_bytes(bytes);
        }
        words
    }

    pub fn from_words(words: [u32; 4]) -> WireAddr128 {
        let mut octets = [0u8; 16];
        for (i, word) in words.iter().enumerate() {
            octets[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        WireAddr128(octets)
    }

    pub fn to_host(self) -> HostAddr128 {
        let words = self.words();
        HostAddr128(
            ((words[0] as u128) << 96)
                | ((words[1] as u128) << 64)
                | ((words[2] as u128) << 32)
                | words[3] as u128,
        )
    }
}

impl fmt::Display for WireAddr128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv6Addr::from(self.0).fmt(f)
    }
}

// A 16-bit big-endian header field, used for checksums. Not meaningful as a
// number until converted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WireUint16([u8; 2]);

impl WireUint16 {
    pub fn from_octets(octets: [u8; 2]) -> WireUint16 {
        WireUint16(octets)
    }

    pub fn octets(&self) -> [u8; 2] {
        self.0
    }

    pub fn from_u16(value: u16) -> WireUint16 {
        WireUint16(value.to_be_bytes())
    }

    pub fn to_u16(self) -> u16 {
        u16::from_be_bytes(self.0)
    }
}
