use std::ffi::CStr;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything a bind or connect call can fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	/// Name/service resolution failed. No socket was created.
	#[error(transparent)]
	Resolution(#[from] ResolutionError),

	/// A socket syscall failed. For bind/connect this is the failure of the
	/// last candidate that was tried.
	#[error(transparent)]
	Socket(#[from] SocketError),
}

impl Error {
	/// Returns the raw platform code (a `getaddrinfo` status or an errno).
	pub fn code(&self) -> i32 {
		match self {
			Error::Resolution(err) => err.code,
			Error::Socket(err) => err.code,
		}
	}

	/// Returns the normalized kind of this error.
	pub fn kind(&self) -> std::io::ErrorKind {
		match self {
			Error::Resolution(err) => err.kind(),
			Error::Socket(err) => err.kind(),
		}
	}
}

/// The syscall a [`SocketError`] came from.
///
/// Candidate attempts only ever report `Create`, `Bind` or `Connect`.
/// The remaining variants belong to the operations of an established socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
	Create,
	Bind,
	Connect,
	SetOption,
	GetOption,
	Listen,
	Accept,
	LocalName,
	PeerName,
	Read,
	Write,
	Shutdown,
}

impl Operation {
	/// Name of the underlying syscall, used in messages and logs.
	pub fn name(self) -> &'static str {
		match self {
			Operation::Create => "socket",
			Operation::Bind => "bind",
			Operation::Connect => "connect",
			Operation::SetOption => "setsockopt",
			Operation::GetOption => "getsockopt",
			Operation::Listen => "listen",
			Operation::Accept => "accept",
			Operation::LocalName => "getsockname",
			Operation::PeerName => "getpeername",
			Operation::Read => "read",
			Operation::Write => "write",
			Operation::Shutdown => "shutdown",
		}
	}
}

impl std::fmt::Display for Operation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// A failed socket syscall: which operation, and the raw errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{operation}() failed: {}", errno_to_str(*.code))]
pub struct SocketError {
	pub operation: Operation,
	pub code: i32,
}

impl SocketError {
	pub fn new(operation: Operation, code: i32) -> Self {
		Self { operation, code }
	}

	/// Builds the error from the calling thread's current errno.
	pub(crate) fn last(operation: Operation) -> Self {
		Self::new(operation, errno())
	}

	/// Normalized kind; the raw code stays available in `code`.
	pub fn kind(&self) -> std::io::ErrorKind {
		errno_to_kind(self.code)
	}
}

/// `getaddrinfo()` failed, or was never called because the request was
/// unusable (empty service, missing node on connect, interior NUL).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("getaddrinfo() failed with error code {code}, \"{message}\"")]
pub struct ResolutionError {
	/// `EAI_*` status.
	pub code: i32,
	pub message: String,
}

impl ResolutionError {
	/// Builds the error for a non-zero `getaddrinfo` status.
	///
	/// `EAI_SYSTEM` means the real cause is in errno, so the message comes
	/// from there instead of `gai_strerror`.
	pub(crate) fn from_gai(code: i32) -> Self {
		let message = if code == libc::EAI_SYSTEM {
			std::io::Error::from_raw_os_error(errno()).to_string()
		} else {
			gai_strerror(code)
		};
		Self { code, message }
	}

	pub fn kind(&self) -> std::io::ErrorKind {
		match self.code {
			libc::EAI_NONAME | libc::EAI_SERVICE => std::io::ErrorKind::NotFound,
			libc::EAI_FAMILY | libc::EAI_SOCKTYPE | libc::EAI_BADFLAGS => {
				std::io::ErrorKind::InvalidInput
			}
			libc::EAI_MEMORY => std::io::ErrorKind::OutOfMemory,
			_ => std::io::ErrorKind::Other,
		}
	}
}

fn gai_strerror(code: i32) -> String {
	// gai_strerror returns a pointer to a static, NUL-terminated string.
	let ptr = unsafe { libc::gai_strerror(code) };
	if ptr.is_null() {
		return format!("getaddrinfo error {}", code);
	}
	unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Returns current errno value.
#[cfg(any(target_os = "linux", target_os = "android"))]
#[inline]
pub fn errno() -> i32 {
	unsafe { *libc::__errno_location() }
}

/// Returns current errno value.
#[cfg(any(
	target_os = "macos",
	target_os = "ios",
	target_os = "freebsd",
	target_os = "dragonfly"
))]
#[inline]
pub fn errno() -> i32 {
	unsafe { *libc::__error() }
}

/// Returns current errno value.
#[cfg(not(any(
	target_os = "linux",
	target_os = "android",
	target_os = "macos",
	target_os = "ios",
	target_os = "freebsd",
	target_os = "dragonfly"
)))]
#[inline]
pub fn errno() -> i32 {
	std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Converts errno to human-readable string.
pub(crate) fn errno_to_str(errno: i32) -> String {
	match errno {
		libc::EACCES => "permission denied".into(),
		libc::EADDRINUSE => "address already in use".into(),
		libc::EADDRNOTAVAIL => "address not available".into(),
		libc::EAFNOSUPPORT => "address family not supported".into(),
		libc::EAGAIN => "resource temporarily unavailable".into(),
		libc::EBADF => "bad file descriptor".into(),
		libc::ECONNREFUSED => "connection refused".into(),
		libc::ECONNRESET => "connection reset by peer".into(),
		libc::EHOSTUNREACH => "host unreachable".into(),
		libc::EINPROGRESS => "operation in progress".into(),
		libc::EINTR => "interrupted by signal".into(),
		libc::EINVAL => "invalid argument".into(),
		libc::EMFILE => "too many open files".into(),
		libc::ENETUNREACH => "network unreachable".into(),
		libc::ENOBUFS => "no buffer space available".into(),
		libc::ENOTCONN => "not connected".into(),
		libc::EPIPE => "broken pipe".into(),
		libc::EPROTONOSUPPORT => "protocol not supported".into(),
		libc::ETIMEDOUT => "connection timed out".into(),
		_ => format!("errno {}", errno),
	}
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
	match errno {
		libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
		libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
		libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
		libc::EAGAIN => std::io::ErrorKind::WouldBlock,
		libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
		libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
		libc::EHOSTUNREACH => std::io::ErrorKind::HostUnreachable,
		libc::ENETUNREACH => std::io::ErrorKind::NetworkUnreachable,
		libc::EINTR => std::io::ErrorKind::Interrupted,
		libc::EINVAL => std::io::ErrorKind::InvalidInput,
		libc::ENOTCONN => std::io::ErrorKind::NotConnected,
		libc::EPIPE => std::io::ErrorKind::BrokenPipe,
		libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
		_ => std::io::ErrorKind::Other,
	}
}

impl From<SocketError> for std::io::Error {
	fn from(err: SocketError) -> Self {
		std::io::Error::new(err.kind(), err)
	}
}

impl From<Error> for std::io::Error {
	fn from(err: Error) -> Self {
		std::io::Error::new(err.kind(), err)
	}
}
