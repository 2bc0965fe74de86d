use std::ffi::CStr;
use std::fmt;
use std::net::Ipv4Addr;

use crate::{Result, SystemError};

/// Who this node is on the control-plane network. Resolved once at process
/// start and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub hostname: String,
    pub address: Ipv4Addr,
}

impl NodeIdentity {
    pub fn new(hostname: impl Into<String>, address: Ipv4Addr) -> Self {
        Self {
            hostname: hostname.into(),
            address,
        }
    }

    /// Resolves the identity from the OS, letting explicit values win.
    pub fn resolve(
        interface: &str,
        hostname: Option<String>,
        address: Option<Ipv4Addr>,
    ) -> Result<Self> {
        let hostname = match hostname {
            Some(hostname) => hostname,
            None => local_hostname()?,
        };
        let address = match address {
            Some(address) => address,
            None => interface_ipv4(interface)?,
        };

        tracing::info!("Resolved node identity {} ({})", hostname, address);
        Ok(Self { hostname, address })
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.hostname, self.address)
    }
}

pub fn local_hostname() -> Result<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for buf.len() bytes for the duration of the call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return Err(SystemError::Io(std::io::Error::last_os_error()));
    }

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// First IPv4 address bound to `name`.
pub fn interface_ipv4(name: &str) -> Result<Ipv4Addr> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: getifaddrs writes a list head we free below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(SystemError::Io(std::io::Error::last_os_error()));
    }

    let mut found = None;
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: cursor is a non-null node of the list returned by getifaddrs,
        // which stays alive until freeifaddrs.
        let entry = unsafe { &*cursor };
        if !entry.ifa_addr.is_null() && !entry.ifa_name.is_null() {
            // SAFETY: ifa_name is non-null and getifaddrs gives a NUL-terminated
            // name owned by the list.
            let ifname = unsafe { CStr::from_ptr(entry.ifa_name) };
            // SAFETY: ifa_addr is non-null and points at a sockaddr owned by
            // the list; every sockaddr starts with its family.
            let family = unsafe { (*entry.ifa_addr).sa_family };
            if ifname.to_bytes() == name.as_bytes() && i32::from(family) == libc::AF_INET {
                // SAFETY: AF_INET entries carry a sockaddr_in.
                let sin = unsafe { &*entry.ifa_addr.cast::<libc::sockaddr_in>() };
                found = Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
                break;
            }
        }
        cursor = entry.ifa_next;
    }

    // SAFETY: head came from a successful getifaddrs call.
    unsafe { libc::freeifaddrs(head) };

    found.ok_or_else(|| SystemError::InterfaceNotFound(name.to_string()))
}
