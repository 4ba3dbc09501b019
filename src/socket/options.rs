use std::os::fd::AsRawFd;

use crate::addr::Family;
use crate::error::{Operation, SocketError};

/// Options applied to every candidate socket before `bind()`.
///
/// All of them are advisory. A failure to set one is logged and the bind
/// attempt goes ahead anyway. None of them are used on the connect path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOptions {
	/// Value for `IPV6_V6ONLY` on IPv6 candidates. `false` lets a wildcard
	/// IPv6 listener accept IPv4-mapped peers too.
	pub v6only: bool,
	/// `SO_REUSEADDR`. Lets a restarted server bind a port still in TIME_WAIT.
	pub reuse_addr: bool,
	/// `SO_REUSEPORT`, where the platform has it.
	pub reuse_port: bool,
}

impl Default for BindOptions {
	fn default() -> Self {
		Self {
			v6only: false,
			reuse_addr: cfg!(unix),
			reuse_port: false,
		}
	}
}

impl BindOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn v6only(mut self, enable: bool) -> Self {
		self.v6only = enable;
		self
	}

	pub fn reuse_addr(mut self, enable: bool) -> Self {
		self.reuse_addr = enable;
		self
	}

	pub fn reuse_port(mut self, enable: bool) -> Self {
		self.reuse_port = enable;
		self
	}

	/// Sets every configured option, returning the failures instead of
	/// stopping at the first one.
	pub(crate) fn apply<S: AsRawFd>(&self, socket: &S, family: Family) -> Vec<SocketError> {
		let mut ignored = Vec::new();
		if family == Family::Ipv6 {
			if let Err(err) = set_v6only(socket, self.v6only) {
				ignored.push(err);
			}
		}
		if self.reuse_addr {
			if let Err(err) = set_reuse_addr(socket, true) {
				ignored.push(err);
			}
		}
		if self.reuse_port {
			if let Err(err) = set_reuse_port(socket, true) {
				ignored.push(err);
			}
		}
		ignored
	}
}

/// Sets IPV6_V6ONLY on a socket.
///
/// With it cleared, an IPv6 socket bound to `::` also receives IPv4
/// connections as `::ffff:a.b.c.d`. Fails on non-IPv6 sockets.
pub fn set_v6only<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int_option(socket, libc::IPPROTO_IPV6, libc::IPV6_V6ONLY, enable as libc::c_int)
}

/// Sets SO_REUSEADDR on a socket.
///
/// Allows binding to an address that's in TIME_WAIT state.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, enable as libc::c_int)
}

/// Sets SO_REUSEPORT on a socket.
///
/// Allows multiple sockets to bind the same port.
#[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
pub fn set_reuse_port<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_REUSEPORT, enable as libc::c_int)
}

/// Sets SO_REUSEPORT on a socket. Not available on this platform.
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub fn set_reuse_port<S: AsRawFd>(_socket: &S, _enable: bool) -> Result<(), SocketError> {
	Err(SocketError::new(Operation::SetOption, libc::ENOPROTOOPT))
}

/// Reads back an integer socket option. Used to check what was applied.
pub fn get_int_option<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
) -> Result<libc::c_int, SocketError> {
	let mut val: libc::c_int = 0;
	let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&mut val as *mut _ as *mut libc::c_void,
			&mut len,
		)
	};
	if result == -1 {
		Err(SocketError::last(Operation::GetOption))
	} else {
		Ok(val)
	}
}

fn set_int_option<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	val: libc::c_int,
) -> Result<(), SocketError> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::last(Operation::SetOption))
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::addr::SockAddr;
	use crate::resolve::Candidate;
	use crate::socket::RawSocket;

	fn candidate(addr: &str) -> Candidate {
		let addr: std::net::SocketAddr = addr.parse().unwrap();
		Candidate {
			family: if addr.is_ipv4() { Family::Ipv4 } else { Family::Ipv6 },
			socktype: libc::SOCK_STREAM,
			protocol: libc::IPPROTO_TCP,
			addr: SockAddr::from(addr),
		}
	}

	#[test]
	fn defaults() {
		let options = BindOptions::default();
		assert!(!options.v6only);
		assert!(options.reuse_addr);
		assert!(!options.reuse_port);
	}

	#[test]
	fn builder_chains() {
		let options = BindOptions::new().v6only(true).reuse_addr(false).reuse_port(true);
		assert_eq!(options, BindOptions { v6only: true, reuse_addr: false, reuse_port: true });
	}

	#[test]
	fn reuse_addr_is_applied() {
		let socket = RawSocket::for_candidate(&candidate("127.0.0.1:0")).unwrap();
		assert!(BindOptions::default().apply(&socket, Family::Ipv4).is_empty());
		let val = get_int_option(&socket, libc::SOL_SOCKET, libc::SO_REUSEADDR).unwrap();
		assert_ne!(val, 0);
	}

	#[test]
	fn failed_option_does_not_prevent_bind() {
		// IPV6_V6ONLY is meaningless on an IPv4 socket, so the option fails.
		let target = candidate("127.0.0.1:0");
		let socket = RawSocket::for_candidate(&target).unwrap();
		let ignored = BindOptions::default().apply(&socket, Family::Ipv6);
		assert_eq!(ignored.len(), 1);
		assert_eq!(ignored[0].operation, Operation::SetOption);
		socket.bind(&target.addr).unwrap();
	}

	#[test]
	fn v6only_follows_configuration() {
		let target = candidate("[::1]:0");
		let Ok(socket) = RawSocket::for_candidate(&target) else {
			return; // no IPv6 on this host
		};
		assert!(BindOptions::new().v6only(true).apply(&socket, Family::Ipv6).is_empty());
		assert_eq!(get_int_option(&socket, libc::IPPROTO_IPV6, libc::IPV6_V6ONLY).unwrap(), 1);
		assert!(BindOptions::new().apply(&socket, Family::Ipv6).is_empty());
		assert_eq!(get_int_option(&socket, libc::IPPROTO_IPV6, libc::IPV6_V6ONLY).unwrap(), 0);
	}
}
