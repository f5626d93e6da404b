use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Private networks: RFC 1918 for IPv4, RFC 4193 unique-local for IPv6.
const INTERNAL_V4: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
];
const INTERNAL_V6: &[(Ipv6Addr, u8)] = &[(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7)];

pub trait HostResolver: Send + Sync {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves through the system resolver with a bounded wait.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        run_bounded(self.timeout, host, async {
            let addrs = tokio::net::lookup_host((host, 0)).await?;
            Ok(addrs.map(|addr| addr.ip()).collect())
        })
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        if tokio::runtime::Handle::try_current().is_err() {
            return self.lookup(host);
        }

        // A runtime cannot be started from within another one.
        std::thread::scope(|scope| {
            scope.spawn(|| self.lookup(host)).join().unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("resolver thread for {} panicked", host),
                ))
            })
        })
    }
}

/// Drive `future` on a private runtime for at most `timeout`.
fn run_bounded<T, F>(timeout: Duration, host: &str, future: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("resolving {} timed out", host),
            )),
        }
    });

    // Dropping the runtime would wait for a stalled getaddrinfo thread.
    runtime.shutdown_background();
    result
}

fn in_v4_network(ip: Ipv4Addr, network: Ipv4Addr, prefix_len: u8) -> bool {
    let mask = u32::MAX
        .checked_shl(32 - prefix_len as u32)
        .unwrap_or(0);
    (u32::from(ip) & mask) == (u32::from(network) & mask)
}

fn in_v6_network(ip: Ipv6Addr, network: Ipv6Addr, prefix_len: u8) -> bool {
    let mask = u128::MAX
        .checked_shl(128 - prefix_len as u32)
        .unwrap_or(0);
    (u128::from(ip) & mask) == (u128::from(network) & mask)
}

pub fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => INTERNAL_V4
            .iter()
            .any(|(network, prefix)| in_v4_network(v4, *network, *prefix)),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal_ip(IpAddr::V4(v4)),
            None => INTERNAL_V6
                .iter()
                .any(|(network, prefix)| in_v6_network(v6, *network, *prefix)),
        },
    }
}

/// Literal addresses are classified directly; names go through `resolver`.
pub fn is_internal_host(resolver: &dyn HostResolver, host: &str) -> bool {
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return is_internal_ip(ip);
    }

    match resolver.resolve(host) {
        Ok(addrs) if addrs.is_empty() => {
            debug!(host, "host resolved to no addresses");
            false
        }
        Ok(addrs) => {
            let internal = addrs.iter().all(|ip| is_internal_ip(*ip));
            debug!(host, ?addrs, internal, "classified host");
            internal
        }
        Err(e) => {
            debug!(host, error = %e, "host resolution failed");
            false
        }
    }
}
