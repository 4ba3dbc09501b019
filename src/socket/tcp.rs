use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::addr::{Family, SockAddr};
use crate::error::{Operation, Result, SocketError};
use crate::resolve::SystemResolver;
use super::attempt::{SystemTransport, bind_candidates, connect_candidates};
use super::options::BindOptions;

/// A TCP socket owned by the caller.
///
/// Starts without a descriptor. `bind*` or `connect` resolve the address,
/// try every candidate and install the first socket that works. Operations
/// on a socket with no descriptor fail with `EBADF`.
#[derive(Debug, Default)]
pub struct TcpSocket {
	fd: Option<OwnedFd>,
}

/// Which half of a connection to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
	Read,      // SHUT_RD
	Write,     // SHUT_WR
	ReadWrite, // SHUT_RDWR
}

impl TcpSocket {
	pub fn new() -> Self {
		Self { fd: None }
	}

	/// Binds to `service` on the wildcard address of `family`.
	pub fn bind(&mut self, service: &str, family: Family) -> Result<()> {
		self.bind_node("", service, family)
	}

	/// Binds to `node`/`service`. An empty `node` means any local address.
	pub fn bind_node(&mut self, node: &str, service: &str, family: Family) -> Result<()> {
		self.bind_with(node, service, family, &BindOptions::default())
	}

	/// Like [`bind_node`](Self::bind_node) with explicit socket options.
	///
	/// A descriptor the socket already held is closed once the new one is in
	/// place. On failure the socket is left as it was.
	pub fn bind_with(&mut self, node: &str, service: &str, family: Family, options: &BindOptions) -> Result<()> {
		let established = bind_candidates(&SystemResolver, &SystemTransport, node, service, family, options)?;
		self.fd = Some(established.handle.into_fd());
		Ok(())
	}

	/// Connects to `node`/`service`, trying each resolved address in turn.
	pub fn connect(&mut self, node: &str, service: &str) -> Result<()> {
		let established = connect_candidates(&SystemResolver, &SystemTransport, node, service)?;
		self.fd = Some(established.handle.into_fd());
		Ok(())
	}

	/// Starts listening with a backlog of `SOMAXCONN`.
	pub fn listen(&self) -> std::result::Result<(), SocketError> {
		self.listen_with_backlog(libc::SOMAXCONN)
	}

	pub fn listen_with_backlog(&self, backlog: i32) -> std::result::Result<(), SocketError> {
		let fd = self.raw(Operation::Listen)?;
		if unsafe { libc::listen(fd, backlog) } == -1 {
			return Err(SocketError::last(Operation::Listen));
		}
		Ok(())
	}

	/// Accepts a connection, blocking until one arrives.
	///
	/// Returns the new socket and the peer's address.
	pub fn accept(&self) -> std::result::Result<(TcpSocket, SocketAddr), SocketError> {
		let fd = self.raw(Operation::Accept)?;
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

		let client = unsafe { accept_cloexec(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len) };
		if client == -1 {
			return Err(SocketError::last(Operation::Accept));
		}
		let client = TcpSocket { fd: Some(unsafe { OwnedFd::from_raw_fd(client) }) };

		let addr = unsafe { SockAddr::from_raw(&storage as *const _ as *const libc::sockaddr, len) }
			.and_then(|addr| addr.to_std())
			.ok_or(SocketError::new(Operation::Accept, libc::EAFNOSUPPORT))?;
		Ok((client, addr))
	}

	/// Returns the local address of this socket.
	pub fn local_addr(&self) -> std::result::Result<SocketAddr, SocketError> {
		self.name(Operation::LocalName, libc::getsockname)
	}

	/// Returns the remote address of this connection.
	pub fn peer_addr(&self) -> std::result::Result<SocketAddr, SocketError> {
		self.name(Operation::PeerName, libc::getpeername)
	}

	pub fn read(&self, buf: &mut [u8]) -> std::result::Result<usize, SocketError> {
		let fd = self.raw(Operation::Read)?;
		let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
		if n == -1 {
			Err(SocketError::last(Operation::Read))
		} else {
			Ok(n as usize)
		}
	}

	pub fn write(&self, buf: &[u8]) -> std::result::Result<usize, SocketError> {
		let fd = self.raw(Operation::Write)?;
		let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
		if n == -1 {
			Err(SocketError::last(Operation::Write))
		} else {
			Ok(n as usize)
		}
	}

	pub fn shutdown(&self, how: Shutdown) -> std::result::Result<(), SocketError> {
		let fd = self.raw(Operation::Shutdown)?;
		let how = match how {
			Shutdown::Read => libc::SHUT_RD,
			Shutdown::Write => libc::SHUT_WR,
			Shutdown::ReadWrite => libc::SHUT_RDWR,
		};
		if unsafe { libc::shutdown(fd, how) } == -1 {
			return Err(SocketError::last(Operation::Shutdown));
		}
		Ok(())
	}

	/// Closes the descriptor, if any. The socket can be bound or connected
	/// again afterwards.
	pub fn close(&mut self) {
		self.fd = None;
	}

	pub fn is_open(&self) -> bool {
		self.fd.is_some()
	}

	/// Returns the raw file descriptor without giving up ownership.
	pub fn as_raw_fd(&self) -> Option<RawFd> {
		self.fd.as_ref().map(|fd| fd.as_raw_fd())
	}

	/// Extracts the owned file descriptor, consuming self.
	pub fn into_owned_fd(self) -> Option<OwnedFd> {
		self.fd
	}

	fn raw(&self, operation: Operation) -> std::result::Result<RawFd, SocketError> {
		self.as_raw_fd().ok_or(SocketError::new(operation, libc::EBADF))
	}

	fn name(
		&self,
		operation: Operation,
		query: unsafe extern "C" fn(libc::c_int, *mut libc::sockaddr, *mut libc::socklen_t) -> libc::c_int,
	) -> std::result::Result<SocketAddr, SocketError> {
		let fd = self.raw(operation)?;
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

		if unsafe { query(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len) } == -1 {
			return Err(SocketError::last(operation));
		}

		unsafe { SockAddr::from_raw(&storage as *const _ as *const libc::sockaddr, len) }
			.and_then(|addr| addr.to_std())
			.ok_or(SocketError::new(operation, libc::EAFNOSUPPORT))
	}
}

#[cfg(any(
	target_os = "linux",
	target_os = "android",
	target_os = "freebsd",
	target_os = "dragonfly",
	target_os = "netbsd",
	target_os = "openbsd"
))]
unsafe fn accept_cloexec(fd: RawFd, addr: *mut libc::sockaddr, len: *mut libc::socklen_t) -> RawFd {
	unsafe { libc::accept4(fd, addr, len, libc::SOCK_CLOEXEC) }
}

#[cfg(not(any(
	target_os = "linux",
	target_os = "android",
	target_os = "freebsd",
	target_os = "dragonfly",
	target_os = "netbsd",
	target_os = "openbsd"
)))]
unsafe fn accept_cloexec(fd: RawFd, addr: *mut libc::sockaddr, len: *mut libc::socklen_t) -> RawFd {
	unsafe { libc::accept(fd, addr, len) }
}

impl From<OwnedFd> for TcpSocket {
	fn from(fd: OwnedFd) -> Self {
		Self { fd: Some(fd) }
	}
}

impl std::io::Read for TcpSocket {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		TcpSocket::read(self, buf).map_err(Into::into)
	}
}

impl std::io::Write for TcpSocket {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		TcpSocket::write(self, buf).map_err(Into::into)
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(()) // no userspace buffer
	}
}
