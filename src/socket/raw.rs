use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use crate::addr::SockAddr;
use crate::error::{Operation, SocketError};
use crate::resolve::Candidate;

#[cfg(any(
	target_os = "linux",
	target_os = "android",
	target_os = "freebsd",
	target_os = "dragonfly",
	target_os = "netbsd",
	target_os = "openbsd"
))]
const CREATE_FLAGS: libc::c_int = libc::SOCK_CLOEXEC;

#[cfg(not(any(
	target_os = "linux",
	target_os = "android",
	target_os = "freebsd",
	target_os = "dragonfly",
	target_os = "netbsd",
	target_os = "openbsd"
)))]
const CREATE_FLAGS: libc::c_int = 0;

/// A socket created for one candidate, not yet bound or connected.
///
/// Dropping it closes the descriptor, which is how failed attempts are
/// discarded.
#[derive(Debug)]
pub struct RawSocket {
	fd: OwnedFd,
}

impl RawSocket {
	/// Calls `socket()` with the candidate's family, type and protocol.
	///
	/// The socket is created close-on-exec where the platform accepts the flag.
	pub fn for_candidate(candidate: &Candidate) -> Result<Self, SocketError> {
		let fd = unsafe {
			libc::socket(
				candidate.family.raw(),
				candidate.socktype | CREATE_FLAGS,
				candidate.protocol,
			)
		};
		if fd == -1 {
			return Err(SocketError::last(Operation::Create));
		}
		Ok(Self { fd: unsafe { OwnedFd::from_raw_fd(fd) } })
	}

	pub fn bind(&self, addr: &SockAddr) -> Result<(), SocketError> {
		let rc = unsafe { libc::bind(self.as_raw_fd(), addr.as_ptr(), addr.len()) };
		if rc == -1 {
			return Err(SocketError::last(Operation::Bind));
		}
		Ok(())
	}

	/// Blocking connect.
	pub fn connect(&self, addr: &SockAddr) -> Result<(), SocketError> {
		let rc = unsafe { libc::connect(self.as_raw_fd(), addr.as_ptr(), addr.len()) };
		if rc == -1 {
			return Err(SocketError::last(Operation::Connect));
		}
		Ok(())
	}

	/// Extracts the owned file descriptor, consuming self.
	pub fn into_fd(self) -> OwnedFd {
		self.fd
	}
}

impl AsRawFd for RawSocket {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for RawSocket {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}

impl IntoRawFd for RawSocket {
	fn into_raw_fd(self) -> RawFd {
		self.fd.into_raw_fd()
	}
}

/*
socket() → RawSocket(OwnedFd)
  bind/connect fail → RawSocket dropped → close()
  bind/connect ok   → into_fd() → owner keeps the descriptor
No path hands the same descriptor to two owners.
*/
