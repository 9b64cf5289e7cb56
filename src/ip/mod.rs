use std::{error, fmt};

use log::trace;

use crate::logger::fmt_slice_hex;

pub mod addr;
pub mod checksum;

use addr::{HostAddr32, HostAddr128, WireAddr32, WireAddr128, WireUint16};
use checksum::{delta_checksum_32, delta_checksum_128};

// One MTU-class packet.
pub const MAX_PACKET_SIZE: usize = 1500;

const IPV4_MIN_HEADER_LENGTH: usize = 20;
const IPV6_HEADER_LENGTH: usize = 40;

const TCP_CHECKSUM_OFFSET: usize = 16;
const UDP_CHECKSUM_OFFSET: usize = 6;
const DCCP_CHECKSUM_OFFSET: usize = 6;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TransportProtocolType(u8);

impl TransportProtocolType {
    pub const TCP: TransportProtocolType = TransportProtocolType(6);
    pub const UDP: TransportProtocolType = TransportProtocolType(17);
    pub const DCCP: TransportProtocolType = TransportProtocolType(33);
    pub const UDP_LITE: TransportProtocolType = TransportProtocolType(136);

    pub fn from_u8(value: u8) -> TransportProtocolType {
        TransportProtocolType(value)
    }

    pub fn to_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Display for TransportProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::TCP => write!(f, "TCP"),
            Self::UDP => write!(f, "UDP"),
            Self::DCCP => write!(f, "DCCP"),
            Self::UDP_LITE => write!(f, "UDPLite"),
            _ => write!(f, "Unknown IP transport protocol {}", self.0),
        }
    }
}

// One packet owned by whoever is driving the read/rewrite/write loop. `sz`
// bytes are always fully initialized wire bytes; bytes past `sz` are never
// exposed.
pub struct PacketBuffer {
    buf: [u8; MAX_PACKET_SIZE],
    sz: usize,
}

impl PacketBuffer {
    pub fn new() -> PacketBuffer {
        PacketBuffer {
            buf: [0u8; MAX_PACKET_SIZE],
            sz: 0,
        }
    }

    pub fn load(&mut self, data: &[u8]) -> Result<(), IpError> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(IpError::PacketTooLarge(data.len()));
        }
        self.buf[..data.len()].copy_from_slice(data);
        self.sz = data.len();
        trace!("Loaded {} byte packet: {}", data.len(), fmt_slice_hex(data));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sz
    }

    pub fn is_empty(&self) -> bool {
        self.sz == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.sz]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[..self.sz]
    }

    pub fn ipv4_header(&self) -> Option<Ipv4Header<'_>> {
        Ipv4Header::from_data(self.as_slice())
    }

    pub fn ipv4_header_mut(&mut self) -> Option<Ipv4HeaderMut<'_>> {
        Ipv4HeaderMut::from_data(self.as_mut_slice())
    }

    pub fn ipv6_header(&self) -> Option<Ipv6Header<'_>> {
        Ipv6Header::from_data(self.as_slice())
    }

    pub fn ipv6_header_mut(&mut self) -> Option<Ipv6HeaderMut<'_>> {
        Ipv6HeaderMut::from_data(self.as_mut_slice())
    }

    // Replaces both addresses of an IPv4 packet and repairs the header
    // checksum plus the transport checksum, if one is reachable in this
    // fragment. A buffer too short for an IPv4 header is left untouched.
    pub fn rewrite_ipv4_addresses(&mut self, new_src: WireAddr32, new_dst: WireAddr32) {
        let (old_src, old_dst, header_length, protocol, fragment_offset) = match self.ipv4_header()
        {
            Some(header) => (
                header.src_addr(),
                header.dst_addr(),
                header.header_length(),
                header.protocol(),
                header.fragment_byte_offset(),
            ),
            None => return,
        };
        trace!(
            "Rewriting {} addresses to src={} dst={}",
            protocol,
            new_src,
            new_dst
        );

        if header_length <= self.sz {
            let payload = &mut self.buf[header_length..self.sz];
            let delta =
                |check: WireUint16| delta_checksum_32(check, old_src, old_dst, new_src, new_dst);
            match protocol {
                TransportProtocolType::TCP => {
                    update_tcp_checksum(payload, fragment_offset, TCP_CHECKSUM_OFFSET, delta)
                }
                TransportProtocolType::DCCP => {
                    update_tcp_checksum(payload, fragment_offset, DCCP_CHECKSUM_OFFSET, delta)
                }
                TransportProtocolType::UDP | TransportProtocolType::UDP_LITE => {
                    update_udp_checksum(payload, fragment_offset, delta)
                }
                _ => {}
            }
        }

        let mut header = match self.ipv4_header_mut() {
            Some(header) => header,
            None => return,
        };
        let check = delta_checksum_32(header.checksum(), old_src, old_dst, new_src, new_dst);
        header.set_checksum(check);
        header.set_src_addr(new_src);
        header.set_dst_addr(new_dst);
    }

    // IPv6 counterpart. There is no IP-level checksum to repair; only the
    // transport checksum covers the addresses through the pseudo-header.
    pub fn rewrite_ipv6_addresses(&mut self, new_src: HostAddr128, new_dst: HostAddr128) {
        // A buffer holding at most the fixed header carries no transport
        // data and is left as is.
        if self.sz <= IPV6_HEADER_LENGTH {
            return;
        }
        let (old_src, old_dst, protocol) = match self.ipv6_header() {
            Some(header) => (header.src_addr(), header.dst_addr(), header.next_header()),
            None => return,
        };
        trace!(
            "Rewriting {} addresses to src={} dst={}",
            protocol,
            new_src,
            new_dst
        );
        let new_src = new_src.to_wire();
        let new_dst = new_dst.to_wire();
        {
            let mut header = match self.ipv6_header_mut() {
                Some(header) => header,
                None => return,
            };
            header.set_src_addr(new_src);
            header.set_dst_addr(new_dst);
        }

        // Only transports carried directly in the fixed header are repaired;
        // there is no extension header walk, and the fixed header is never
        // fragment-shifted.
        let payload = &mut self.buf[IPV6_HEADER_LENGTH..self.sz];
        let delta =
            |check: WireUint16| delta_checksum_128(check, old_src, old_dst, new_src, new_dst);
        match protocol {
            TransportProtocolType::TCP => {
                update_tcp_checksum(payload, 0, TCP_CHECKSUM_OFFSET, delta)
            }
            TransportProtocolType::DCCP => {
                update_tcp_checksum(payload, 0, DCCP_CHECKSUM_OFFSET, delta)
            }
            TransportProtocolType::UDP | TransportProtocolType::UDP_LITE => {
                update_udp_checksum(payload, 0, delta)
            }
            _ => {}
        }
    }
}

// TCP and DCCP carry the checksum at a protocol-specific offset within the
// transport header. A checksum field that lives in a later fragment, or past
// the end of a truncated buffer, is left for the fragment that actually
// contains it.
fn update_tcp_checksum(
    payload: &mut [u8],
    fragment_offset: usize,
    checksum_offset: usize,
    delta: impl Fn(WireUint16) -> WireUint16,
) {
    if fragment_offset > checksum_offset {
        return;
    }
    let pos = checksum_offset - fragment_offset;
    if pos + 2 > payload.len() {
        return;
    }
    let check = delta(WireUint16::from_octets([payload[pos], payload[pos + 1]]));
    // A genuine TCP or DCCP checksum can never be 0xffff: the stored value
    // is inverted, and a one's-complement sum of a non-empty segment cannot
    // be 0x0000. Fold the reserved pattern back to its equivalent.
    let check = if check.to_u16() == 0xffff {
        WireUint16::from_u16(0x0000)
    } else {
        check
    };
    payload[pos..pos + 2].copy_from_slice(&check.octets());
}

// UDP and UDP-Lite keep the checksum at offset 6, and 0x0000 is the "no
// checksum" sentinel rather than a computed value, so it is never perturbed.
// Starting from a nonzero field, the delta cannot yield zero, so the result
// needs no normalization.
fn update_udp_checksum(
    payload: &mut [u8],
    fragment_offset: usize,
    delta: impl Fn(WireUint16) -> WireUint16,
) {
    if fragment_offset > UDP_CHECKSUM_OFFSET {
        return;
    }
    let pos = UDP_CHECKSUM_OFFSET - fragment_offset;
    if pos + 2 > payload.len() {
        return;
    }
    let check = WireUint16::from_octets([payload[pos], payload[pos + 1]]);
    if check.to_u16() == 0x0000 {
        return;
    }
    let check = delta(check);
    payload[pos..pos + 2].copy_from_slice(&check.octets());
}

pub struct Ipv4Header<'a> {
    data: &'a [u8],
}

impl Ipv4Header<'_> {
    const FRAGMENT_OFFSET_MASK: u16 = 0x1fff;

    fn from_data(data: &[u8]) -> Option<Ipv4Header<'_>> {
        if data.len() < IPV4_MIN_HEADER_LENGTH {
            return None;
        }
        Some(Ipv4Header { data })
    }

    pub fn header_length(&self) -> usize {
        (self.data[0] & 0x0f) as usize * 4
    }

    pub fn protocol(&self) -> TransportProtocolType {
        TransportProtocolType::from_u8(self.data[9])
    }

    // Byte offset of this fragment's payload within the original datagram,
    // nonzero only for second and later fragments.
    pub fn fragment_byte_offset(&self) -> usize {
        let mut fragment = [0u8; 2];
        fragment.copy_from_slice(&self.data[6..8]);
        let fragment = u16::from_be_bytes(fragment);
        (fragment & Self::FRAGMENT_OFFSET_MASK) as usize * 8
    }

    pub fn checksum(&self) -> WireUint16 {
        WireUint16::from_octets([self.data[10], self.data[11]])
    }

    pub fn src_addr(&self) -> WireAddr32 {
        let mut addr = [0u8; 4];
        addr.copy_from_slice(&self.data[12..16]);
        WireAddr32::from_octets(addr)
    }

    pub fn dst_addr(&self) -> WireAddr32 {
        let mut addr = [0u8; 4];
        addr.copy_from_slice(&self.data[16..20]);
        WireAddr32::from_octets(addr)
    }

    pub fn src_host(&self) -> HostAddr32 {
        self.src_addr().to_host()
    }

    pub fn dst_host(&self) -> HostAddr32 {
        self.dst_addr().to_host()
    }
}

pub struct Ipv4HeaderMut<'a> {
    data: &'a mut [u8],
}

impl Ipv4HeaderMut<'_> {
    fn from_data(data: &mut [u8]) -> Option<Ipv4HeaderMut<'_>> {
        if data.len() < IPV4_MIN_HEADER_LENGTH {
            return None;
        }
        Some(Ipv4HeaderMut { data })
    }

    pub fn checksum(&self) -> WireUint16 {
        WireUint16::from_octets([self.data[10], self.data[11]])
    }

    pub fn set_checksum(&mut self, check: WireUint16) {
        self.data[10..12].copy_from_slice(&check.octets());
    }

    pub fn set_src_addr(&mut self, addr: WireAddr32) {
        self.data[12..16].copy_from_slice(&addr.octets());
    }

    pub fn set_dst_addr(&mut self, addr: WireAddr32) {
        self.data[16..20].copy_from_slice(&addr.octets());
    }
}

pub struct Ipv6Header<'a> {
    data: &'a [u8],
}

impl Ipv6Header<'_> {
    fn from_data(data: &[u8]) -> Option<Ipv6Header<'_>> {
        if data.len() < IPV6_HEADER_LENGTH {
            return None;
        }
        Some(Ipv6Header { data })
    }

    pub fn next_header(&self) -> TransportProtocolType {
        TransportProtocolType::from_u8(self.data[6])
    }

    pub fn src_addr(&self) -> WireAddr128 {
        let mut addr = [0u8; 16];
        addr.copy_from_slice(&self.data[8..24]);
        WireAddr128::from_octets(addr)
    }

    pub fn dst_addr(&self) -> WireAddr128 {
        let mut addr = [0u8; 16];
        addr.copy_from_slice(&self.data[24..40]);
        WireAddr128::from_octets(addr)
    }

    pub fn src_host(&self) -> HostAddr128 {
        self.src_addr().to_host()
    }

    pub fn dst_host(&self) -> HostAddr128 {
        self.dst_addr().to_host()
    }
}

pub struct Ipv6HeaderMut<'a> {
    data: &'a mut [u8],
}

impl Ipv6HeaderMut<'_> {
    fn from_data(data: &mut [u8]) -> Option<Ipv6HeaderMut<'_>> {
        if data.len() < IPV6_HEADER_LENGTH {
            return None;
        }
        Some(Ipv6HeaderMut { data })
    }

    pub fn set_src_addr(&mut self, addr: WireAddr128) {
        self.data[8..24].copy_from_slice(&addr.octets());
    }

    pub fn set_dst_addr(&mut self, addr: WireAddr128) {
        self.data[24..40].copy_from_slice(&addr.octets());
    }
}

#[derive(Debug)]
pub enum IpError {
    PacketTooLarge(usize),
}

impl fmt::Display for IpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PacketTooLarge(size) => write!(
                f,
                "Packet of {} bytes exceeds the {} byte buffer",
                size, MAX_PACKET_SIZE
            ),
        }
    }
}

impl error::Error for IpError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::PacketTooLarge(_) => None,
        }
    }
}
