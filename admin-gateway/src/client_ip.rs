use std::net::{AddrParseError, IpAddr, SocketAddr};

use axum::http::HeaderMap;

/// Peers allowed to speak for the caller through `X-Forwarded-For` / `X-Real-IP`.
///
/// Empty by default, in which case forwarding headers are ignored and the socket peer
/// is the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies {
    addrs: Vec<IpAddr>,
}

impl TrustedProxies {
    /// Comma-separated IP list, e.g. `10.0.0.1, 10.0.0.2`.
    pub fn parse(raw: &str) -> Result<Self, AddrParseError> {
        let addrs = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<IpAddr>, _>>()?;
        Ok(Self { addrs })
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    fn contains(&self, ip: IpAddr) -> bool {
        self.addrs.contains(&ip)
    }
}

/// Rate-limit identity of the caller.
///
/// Forwarding headers are read only when the socket peer is a trusted proxy. The
/// caller is then the rightmost `X-Forwarded-For` hop that is not itself a trusted
/// proxy, falling back to `X-Real-IP` and finally the peer.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    proxies: &TrustedProxies,
) -> String {
    let Some(peer) = peer.map(|addr| addr.ip()) else {
        return "unknown".to_string();
    };
    if !proxies.contains(peer) {
        return peer.to_string();
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(chain) = header("x-forwarded-for") {
        let hops: Vec<&str> = chain
            .split(',')
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();
        let client = hops
            .iter()
            .rev()
            .find(|hop| !hop.parse().is_ok_and(|ip| proxies.contains(ip)))
            .or_else(|| hops.first());
        if let Some(client) = client {
            return client.to_string();
        }
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    peer.to_string()
}
