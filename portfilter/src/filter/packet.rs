//! Mutable view over the IPv4 and TCP headers of a raw packet

use crate::error::PacketError;
use std::net::Ipv4Addr;

const IPV4_MIN_HEADER: usize = 20;
const TCP_MIN_HEADER: usize = 20;

/// IANA protocol number for TCP
pub const IPPROTO_TCP: u8 = 6;

const TCP_FIN: u8 = 0x01;
const TCP_SYN: u8 = 0x02;
const TCP_RST: u8 = 0x04;
const TCP_ACK: u8 = 0x10;

/// The TCP control bits recorded for every decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlags {
    pub syn: bool,
    pub fin: bool,
    pub ack: bool,
    pub rst: bool,
}

impl TcpFlags {
    fn from_byte(b: u8) -> Self {
        Self {
            syn: b & TCP_SYN != 0,
            fin: b & TCP_FIN != 0,
            ack: b & TCP_ACK != 0,
            rst: b & TCP_RST != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut b = 0;
        if self.syn {
            b |= TCP_SYN;
        }
        if self.fin {
            b |= TCP_FIN;
        }
        if self.ack {
            b |= TCP_ACK;
        }
        if self.rst {
            b |= TCP_RST;
        }
        b
    }
}

/// Borrowed view over one IPv4/TCP packet buffer.
///
/// Getters read straight from the buffer, and `redirect_to` writes back into
/// it, so the caller forwards the rewritten bytes as soon as the view drops.
#[derive(Debug)]
pub struct PacketView<'a> {
    buf: &'a mut [u8],
    ihl: usize,
}

impl<'a> PacketView<'a> {
    /// Validate the headers and wrap `buf`, which starts at the IPv4 header
    pub fn new(buf: &'a mut [u8]) -> Result<Self, PacketError> {
        if buf.len() < IPV4_MIN_HEADER {
            return Err(PacketError::Truncated);
        }

        let version = buf[0] >> 4;
        if version != 4 {
            return Err(PacketError::NotIpv4(version));
        }

        let words = buf[0] & 0x0f;
        if words < 5 {
            return Err(PacketError::BadHeaderLength(words));
        }

        let protocol = buf[9];
        if protocol != IPPROTO_TCP {
            return Err(PacketError::NotTcp(protocol));
        }

        let ihl = words as usize * 4;
        if buf.len() < ihl + TCP_MIN_HEADER {
            return Err(PacketError::Truncated);
        }

        Ok(Self { buf, ihl })
    }

    pub fn protocol(&self) -> u8 {
        self.buf[9]
    }

    pub fn source_addr(&self) -> Ipv4Addr {
        self.addr_at(12)
    }

    pub fn dest_addr(&self) -> Ipv4Addr {
        self.addr_at(16)
    }

    pub fn source_port(&self) -> u16 {
        self.port_at(0)
    }

    pub fn dest_port(&self) -> u16 {
        self.port_at(2)
    }

    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from_byte(self.buf[self.ihl + 13])
    }

    /// Rewrite destination address and port together
    pub fn redirect_to(&mut self, addr: Ipv4Addr, port: u16) {
        self.buf[16..20].copy_from_slice(&addr.octets());
        let off = self.ihl + 2;
        self.buf[off..off + 2].copy_from_slice(&port.to_be_bytes());
    }

    /// Recompute the IPv4 header checksum and the TCP checksum in place
    pub fn refresh_checksums(&mut self) {
        let ihl = self.ihl;

        self.buf[10] = 0;
        self.buf[11] = 0;
        let ip_sum = checksum(&self.buf[..ihl], 0);
        self.buf[10..12].copy_from_slice(&ip_sum.to_be_bytes());

        // Trailing link-layer padding is not part of the segment
        let total_len = u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize;
        let end = if total_len >= ihl + TCP_MIN_HEADER {
            total_len.min(self.buf.len())
        } else {
            self.buf.len()
        };

        let csum_off = ihl + 16;
        self.buf[csum_off] = 0;
        self.buf[csum_off + 1] = 0;

        let segment_len = end - ihl;
        let mut pseudo: u32 = 0;
        for chunk in self.buf[12..20].chunks_exact(2) {
            pseudo += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
        }
        pseudo += IPPROTO_TCP as u32;
        pseudo += segment_len as u32;

        let tcp_sum = checksum(&self.buf[ihl..end], pseudo);
        self.buf[csum_off..csum_off + 2].copy_from_slice(&tcp_sum.to_be_bytes());
    }

    fn addr_at(&self, off: usize) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buf[off],
            self.buf[off + 1],
            self.buf[off + 2],
            self.buf[off + 3],
        )
    }

    fn port_at(&self, off: usize) -> u16 {
        let off = self.ihl + off;
        u16::from_be_bytes([self.buf[off], self.buf[off + 1]])
    }
}

/// RFC 1071 one's-complement sum over `data`, seeded with `initial`
fn checksum(data: &[u8], initial: u32) -> u16 {
    let mut sum = initial;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while (sum >> 16) != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}


#[cfg(test)]
mod tests {
    use super::test_packet::{syn, tcp};
    use super::*;

    #[test]
    fn test_field_getters() {
        let flags = TcpFlags {
            syn: false,
            fin: true,
            ack: true,
            rst: false,
        };
        let mut buf = tcp(
            Ipv4Addr::new(192, 168, 1, 10),
            40000,
            Ipv4Addr::new(93, 184, 216, 34),
            443,
            flags,
        );
        let view = PacketView::new(&mut buf).unwrap();

        assert_eq!(view.protocol(), IPPROTO_TCP);
        assert_eq!(view.source_addr(), Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(view.dest_addr(), Ipv4Addr::new(93, 184, 216, 34));
        assert_eq!(view.source_port(), 40000);
        assert_eq!(view.dest_port(), 443);
        assert_eq!(view.flags(), flags);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]) as usize, buf.len());
    }

    #[test]
    fn test_redirect_writes_back() {
        let mut buf = syn(8080, 80);
        {
            let mut view = PacketView::new(&mut buf).unwrap();
            view.redirect_to(Ipv4Addr::new(131, 1, 1, 1), 8080);
        }

        assert_eq!(&buf[16..20], &[131, 1, 1, 1]);
        assert_eq!(u16::from_be_bytes([buf[22], buf[23]]), 8080);
        // Source side untouched
        assert_eq!(&buf[12..16], &[10, 0, 0, 1]);
        assert_eq!(u16::from_be_bytes([buf[20], buf[21]]), 8080);
    }

    #[test]
    fn test_options_shift_tcp_header() {
        let mut buf = syn(1234, 80);
        // Grow the IPv4 header by one option word
        buf[0] = 0x46;
        buf.splice(20..20, [1u8, 1, 1, 0]);

        let view = PacketView::new(&mut buf).unwrap();
        assert_eq!(view.source_port(), 1234);
        assert_eq!(view.dest_port(), 80);
        assert!(view.flags().syn);
    }

    #[test]
    fn test_rejects_malformed() {
        let mut short = vec![0x45u8; 10];
        assert_eq!(PacketView::new(&mut short).unwrap_err(), PacketError::Truncated);

        let mut v6 = syn(1, 2);
        v6[0] = 0x65;
        assert_eq!(PacketView::new(&mut v6).unwrap_err(), PacketError::NotIpv4(6));

        let mut bad_ihl = syn(1, 2);
        bad_ihl[0] = 0x44;
        assert_eq!(
            PacketView::new(&mut bad_ihl).unwrap_err(),
            PacketError::BadHeaderLength(4)
        );

        let mut udp = syn(1, 2);
        udp[9] = 17;
        assert_eq!(PacketView::new(&mut udp).unwrap_err(), PacketError::NotTcp(17));

        let mut no_tcp = syn(1, 2);
        no_tcp.truncate(30);
        assert_eq!(PacketView::new(&mut no_tcp).unwrap_err(), PacketError::Truncated);
    }

    #[test]
    fn test_refresh_checksums_verifies() {
        let mut buf = syn(5555, 80);
        {
            let mut view = PacketView::new(&mut buf).unwrap();
            view.redirect_to(Ipv4Addr::new(131, 1, 1, 1), 5555);
            view.refresh_checksums();
        }

        // A correct header sums to zero including its checksum
        assert_eq!(checksum(&buf[..20], 0), 0);

        let mut pseudo: u32 = 0;
        for chunk in buf[12..20].chunks_exact(2) {
            pseudo += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
        }
        pseudo += IPPROTO_TCP as u32 + 20;
        assert_eq!(checksum(&buf[20..], pseudo), 0);
    }

    #[test]
    fn test_flags_byte() {
        let all = TcpFlags {
            syn: true,
            fin: true,
            ack: true,
            rst: true,
        };
        assert_eq!(TcpFlags::from_byte(all.to_byte()), all);
        assert_eq!(TcpFlags::from_byte(0x08), TcpFlags::default()); // PSH only
    }
}
