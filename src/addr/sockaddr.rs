use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use super::Family;

/// A concrete socket address, stored the way the kernel wants it.
///
/// Holds any address family in a `sockaddr_storage` so candidates from the
/// resolver can be passed straight back to `bind()`/`connect()`.
#[derive(Clone, Copy)]
pub struct SockAddr {
	storage: libc::sockaddr_storage,
	len: libc::socklen_t,
}

impl SockAddr {
	/// Copies a raw sockaddr.
	///
	/// Returns `None` if `len` is larger than `sockaddr_storage`.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes.
	pub(crate) unsafe fn from_raw(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if addr.is_null() || len as usize > std::mem::size_of::<libc::sockaddr_storage>() {
			return None;
		}
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		unsafe {
			std::ptr::copy_nonoverlapping(
				addr as *const u8,
				&mut storage as *mut _ as *mut u8,
				len as usize,
			);
		}
		Some(Self { storage, len })
	}

	/// Address family of the stored address.
	pub fn family(&self) -> Option<Family> {
		Family::from_raw(self.storage.ss_family as libc::c_int)
	}

	/// Pointer for syscalls. Valid for as long as `self` is borrowed.
	#[inline]
	pub fn as_ptr(&self) -> *const libc::sockaddr {
		&self.storage as *const _ as *const libc::sockaddr
	}

	/// Length in bytes of the address behind `as_ptr()`.
	#[inline]
	pub fn len(&self) -> libc::socklen_t {
		self.len
	}

	/// Converts to a std address. `None` for anything that is not inet/inet6.
	pub fn to_std(&self) -> Option<SocketAddr> {
		match self.storage.ss_family as libc::c_int {
			libc::AF_INET if self.len as usize >= std::mem::size_of::<libc::sockaddr_in>() => {
				let raw = unsafe { &*(self.as_ptr() as *const libc::sockaddr_in) };
				let ip = Ipv4Addr::from(raw.sin_addr.s_addr.to_ne_bytes());
				Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(raw.sin_port))))
			}
			libc::AF_INET6 if self.len as usize >= std::mem::size_of::<libc::sockaddr_in6>() => {
				let raw = unsafe { &*(self.as_ptr() as *const libc::sockaddr_in6) };
				Some(SocketAddr::V6(SocketAddrV6::new(
					Ipv6Addr::from(raw.sin6_addr.s6_addr),
					u16::from_be(raw.sin6_port),
					raw.sin6_flowinfo,
					raw.sin6_scope_id,
				)))
			}
			_ => None,
		}
	}

	/// Port number, for inet/inet6 addresses.
	pub fn port(&self) -> Option<u16> {
		self.to_std().map(|addr| addr.port())
	}
}

impl From<SocketAddr> for SockAddr {
	fn from(addr: SocketAddr) -> Self {
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let len = match addr {
			SocketAddr::V4(v4) => {
				let raw = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
				raw.sin_family = libc::AF_INET as libc::sa_family_t;
				raw.sin_port = v4.port().to_be();
				raw.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
				std::mem::size_of::<libc::sockaddr_in>()
			}
			SocketAddr::V6(v6) => {
				let raw = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
				raw.sin6_family = libc::AF_INET6 as libc::sa_family_t;
				raw.sin6_port = v6.port().to_be();
				raw.sin6_flowinfo = v6.flowinfo();
				raw.sin6_addr.s6_addr = v6.ip().octets();
				raw.sin6_scope_id = v6.scope_id();
				std::mem::size_of::<libc::sockaddr_in6>()
			}
		};
		Self { storage, len: len as libc::socklen_t }
	}
}

impl std::fmt::Debug for SockAddr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.to_std() {
			Some(addr) => write!(f, "{}", addr),
			None => write!(f, "<family {}, {} bytes>", self.storage.ss_family, self.len),
		}
	}
}

impl std::fmt::Display for SockAddr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(self, f)
	}
}

impl PartialEq for SockAddr {
	fn eq(&self, other: &Self) -> bool {
		let a = unsafe { std::slice::from_raw_parts(self.as_ptr() as *const u8, self.len as usize) };
		let b = unsafe { std::slice::from_raw_parts(other.as_ptr() as *const u8, other.len as usize) };
		a == b
	}
}

impl Eq for SockAddr {}

/*
sockaddr_in   — 16 bytes: family, port (big-endian), 4-byte address, padding
sockaddr_in6  — 28 bytes: family, port, flowinfo, 16-byte address, scope id
sockaddr_storage is large enough for either, so one type covers every
candidate the resolver can hand back.
*/
