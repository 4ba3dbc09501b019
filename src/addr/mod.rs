//! Address families and socket addresses.
//!
//! `Family` is the caller's preference passed to the resolver.
//! `SockAddr` is a concrete address as the kernel sees it: a
//! `sockaddr_storage` plus the length that is actually in use.

mod sockaddr;
pub use self::sockaddr::SockAddr;

/// Address family preference.
///
/// `Unspecified` lets the resolver return every family it knows about,
/// in its own preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Family {
	#[default]
	Unspecified,
	Ipv4,
	Ipv6,
}

impl Family {
	/// Returns the libc constant for this address family.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Family::Unspecified => libc::AF_UNSPEC,
			Family::Ipv4 => libc::AF_INET,
			Family::Ipv6 => libc::AF_INET6,
		}
	}

	/// Maps a libc constant back. Families other than inet/inet6 have no
	/// counterpart and yield `None`.
	pub fn from_raw(raw: libc::c_int) -> Option<Self> {
		match raw {
			libc::AF_UNSPEC => Some(Family::Unspecified),
			libc::AF_INET => Some(Family::Ipv4),
			libc::AF_INET6 => Some(Family::Ipv6),
			_ => None,
		}
	}
}

/*
  ┌─────────────┬───────────┬───────────────┐
  │   Family    │ Constant  │ Value (Linux) │
  ├─────────────┼───────────┼───────────────┤
  │ Unspecified │ AF_UNSPEC │ 0             │
  ├─────────────┼───────────┼───────────────┤
  │ Ipv4        │ AF_INET   │ 2             │
  ├─────────────┼───────────┼───────────────┤
  │ Ipv6        │ AF_INET6  │ 10            │
  └─────────────┴───────────┴───────────────┘
*/
