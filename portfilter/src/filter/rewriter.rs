//! Proxy redirection of matched packets

use super::classifier::Disposition;
use super::packet::PacketView;
use crate::config::schema::DEFAULT_PROXY_ADDR;
use std::net::Ipv4Addr;

/// Redirects packets to a fixed proxy address.
///
/// The destination port becomes the packet's own source port, not the
/// original destination port.
#[derive(Debug, Clone)]
pub struct ProxyRewriter {
    proxy_addr: Ipv4Addr,
    refresh_checksums: bool,
}

impl ProxyRewriter {
    pub fn new(proxy_addr: Ipv4Addr) -> Self {
        Self {
            proxy_addr,
            refresh_checksums: false,
        }
    }

    /// Also recompute IPv4/TCP checksums after rewriting
    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.refresh_checksums = enabled;
        self
    }

    pub fn rewrite(&self, view: &mut PacketView<'_>) -> Disposition {
        let port = view.source_port();
        view.redirect_to(self.proxy_addr, port);
        if self.refresh_checksums {
            view.refresh_checksums();
        }

        Disposition::AcceptWithRewrite {
            addr: self.proxy_addr,
            port,
        }
    }
}

impl Default for ProxyRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_ADDR)
    }
}
