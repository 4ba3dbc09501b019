//! Resolve, try each candidate in order, keep the first socket that works.
//!
//! Bind and connect share one loop. They differ only in whether options are
//! applied and which syscall finishes the attempt; see [`Mode`].

use tracing::{debug, error};

use crate::addr::Family;
use crate::error::{Error, ResolutionError, SocketError};
use crate::resolve::{Candidate, ResolutionRequest, Resolver};
use super::options::BindOptions;
use super::raw::RawSocket;

/// Socket primitives the loop drives.
///
/// A `Handle` is closed by dropping it. The loop drops every handle it does
/// not return.
pub trait Transport {
	type Handle;

	fn create(&self, candidate: &Candidate) -> Result<Self::Handle, SocketError>;

	/// Best-effort option setup before `bind`. Cannot fail the attempt.
	fn prepare_bind(&self, handle: &Self::Handle, candidate: &Candidate, options: &BindOptions);

	fn bind(&self, handle: &Self::Handle, candidate: &Candidate) -> Result<(), SocketError>;

	fn connect(&self, handle: &Self::Handle, candidate: &Candidate) -> Result<(), SocketError>;
}

/// Real sockets through libc.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTransport;

impl Transport for SystemTransport {
	type Handle = RawSocket;

	fn create(&self, candidate: &Candidate) -> Result<RawSocket, SocketError> {
		RawSocket::for_candidate(candidate)
	}

	fn prepare_bind(&self, handle: &RawSocket, candidate: &Candidate, options: &BindOptions) {
		for err in options.apply(handle, candidate.family) {
			debug!(addr = %candidate.addr, code = err.code, "ignoring socket option failure: {}", err);
		}
	}

	fn bind(&self, handle: &RawSocket, candidate: &Candidate) -> Result<(), SocketError> {
		handle.bind(&candidate.addr)
	}

	fn connect(&self, handle: &RawSocket, candidate: &Candidate) -> Result<(), SocketError> {
		handle.connect(&candidate.addr)
	}
}

/// Which operation finishes an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode<'a> {
	Bind(&'a BindOptions),
	Connect,
}

/// The winning handle and the candidate it was established for.
#[derive(Debug)]
pub struct Established<H> {
	pub handle: H,
	pub candidate: Candidate,
}

/// Resolves `node`/`service` passively and binds the first candidate that
/// accepts it. An empty `node` binds the wildcard address.
pub fn bind_candidates<R, T>(
	resolver: &R,
	transport: &T,
	node: &str,
	service: &str,
	family: Family,
	options: &BindOptions,
) -> Result<Established<T::Handle>, Error>
where
	R: Resolver,
	T: Transport,
{
	let request = ResolutionRequest::passive(node, service, family);
	establish(resolver, transport, &request, Mode::Bind(options))
}

/// Resolves `node`/`service` with no family preference and connects to the
/// first candidate that answers.
pub fn connect_candidates<R, T>(
	resolver: &R,
	transport: &T,
	node: &str,
	service: &str,
) -> Result<Established<T::Handle>, Error>
where
	R: Resolver,
	T: Transport,
{
	let request = ResolutionRequest::active(node, service);
	establish(resolver, transport, &request, Mode::Connect)
}

/// One resolution, one pass over the candidates.
pub fn establish<R, T>(
	resolver: &R,
	transport: &T,
	request: &ResolutionRequest,
	mode: Mode<'_>,
) -> Result<Established<T::Handle>, Error>
where
	R: Resolver,
	T: Transport,
{
	let candidates = resolver.resolve(request).map_err(|err| {
		error!(code = err.code, message = %err.message, "{}", err);
		err
	})?;

	let mut failure = LastFailure::default();

	for candidate in candidates {
		match attempt(transport, &candidate, mode) {
			Ok(handle) => {
				debug!(addr = %candidate.addr, "socket established");
				return Ok(Established { handle, candidate });
			}
			Err(err) => failure.record(&candidate, err),
		}
	}

	Err(failure.into_error())
}

fn attempt<T: Transport>(transport: &T, candidate: &Candidate, mode: Mode<'_>) -> Result<T::Handle, SocketError> {
	let handle = transport.create(candidate)?;
	match mode {
		Mode::Bind(options) => {
			transport.prepare_bind(&handle, candidate, options);
			transport.bind(&handle, candidate)?;
		}
		Mode::Connect => transport.connect(&handle, candidate)?,
	}
	Ok(handle)
}

/// Most recent failed attempt. Earlier ones only reach the debug log.
#[derive(Debug, Default)]
struct LastFailure {
	last: Option<SocketError>,
}

impl LastFailure {
	fn record(&mut self, candidate: &Candidate, err: SocketError) {
		debug!(addr = %candidate.addr, operation = %err.operation, code = err.code, "candidate failed: {}", err);
		self.last = Some(err);
	}

	fn into_error(self) -> Error {
		match self.last {
			Some(err) => {
				error!(operation = %err.operation, code = err.code, "Invalid socket: {}", err);
				Error::Socket(err)
			}
			// Only reachable with a resolver that broke its contract.
			None => Error::Resolution(ResolutionError::from_gai(libc::EAI_NONAME)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::addr::SockAddr;
	use crate::error::Operation;
	use std::cell::{Cell, RefCell};
	use std::collections::HashMap;
	use std::rc::Rc;

	fn candidate(port: u16) -> Candidate {
		Candidate {
			family: Family::Ipv4,
			socktype: libc::SOCK_STREAM,
			protocol: libc::IPPROTO_TCP,
			addr: SockAddr::from(std::net::SocketAddr::from(([127, 0, 0, 1], port))),
		}
	}

	struct FakeResolver {
		result: Result<Vec<Candidate>, ResolutionError>,
		calls: Cell<usize>,
	}

	impl FakeResolver {
		fn ports(ports: &[u16]) -> Self {
			Self {
				result: Ok(ports.iter().copied().map(candidate).collect()),
				calls: Cell::new(0),
			}
		}

		fn failing(code: i32) -> Self {
			Self {
				result: Err(ResolutionError { code, message: "fake".into() }),
				calls: Cell::new(0),
			}
		}
	}

	impl Resolver for FakeResolver {
		fn resolve(&self, _request: &ResolutionRequest) -> Result<Vec<Candidate>, ResolutionError> {
			self.calls.set(self.calls.get() + 1);
			self.result.clone()
		}
	}

	#[derive(Debug)]
	struct FakeHandle {
		port: u16,
		live: Rc<Cell<usize>>,
	}

	impl Drop for FakeHandle {
		fn drop(&mut self) {
			self.live.set(self.live.get() - 1);
		}
	}

	/// Fails the listed port at the listed step with the listed code.
	#[derive(Default)]
	struct FakeTransport {
		failures: HashMap<u16, SocketError>,
		live: Rc<Cell<usize>>,
		log: RefCell<Vec<(&'static str, u16)>>,
	}

	impl FakeTransport {
		fn fail(mut self, port: u16, operation: Operation, code: i32) -> Self {
			self.failures.insert(port, SocketError::new(operation, code));
			self
		}

		fn step(&self, name: &'static str, operation: Operation, port: u16) -> Result<(), SocketError> {
			self.log.borrow_mut().push((name, port));
			match self.failures.get(&port) {
				Some(err) if err.operation == operation => Err(*err),
				_ => Ok(()),
			}
		}

		fn log(&self) -> Vec<(&'static str, u16)> {
			self.log.borrow().clone()
		}
	}

	fn port_of(candidate: &Candidate) -> u16 {
		candidate.addr.port().unwrap()
	}

	impl Transport for FakeTransport {
		type Handle = FakeHandle;

		fn create(&self, candidate: &Candidate) -> Result<FakeHandle, SocketError> {
			let port = port_of(candidate);
			self.step("create", Operation::Create, port)?;
			self.live.set(self.live.get() + 1);
			Ok(FakeHandle { port, live: Rc::clone(&self.live) })
		}

		fn prepare_bind(&self, handle: &FakeHandle, _candidate: &Candidate, _options: &BindOptions) {
			self.log.borrow_mut().push(("options", handle.port));
		}

		fn bind(&self, handle: &FakeHandle, _candidate: &Candidate) -> Result<(), SocketError> {
			self.step("bind", Operation::Bind, handle.port)
		}

		fn connect(&self, handle: &FakeHandle, _candidate: &Candidate) -> Result<(), SocketError> {
			self.step("connect", Operation::Connect, handle.port)
		}
	}

	#[test]
	fn first_success_wins_and_stops_the_loop() {
		let resolver = FakeResolver::ports(&[1, 2, 3]);
		let transport = FakeTransport::default().fail(1, Operation::Connect, libc::ECONNREFUSED);

		let established = connect_candidates(&resolver, &transport, "host", "80").unwrap();

		assert_eq!(established.handle.port, 2);
		assert_eq!(port_of(&established.candidate), 2);
		assert_eq!(
			transport.log(),
			vec![("create", 1), ("connect", 1), ("create", 2), ("connect", 2)]
		);
	}

	#[test]
	fn only_the_committed_handle_stays_open() {
		let resolver = FakeResolver::ports(&[1, 2, 3, 4]);
		let transport = FakeTransport::default()
			.fail(1, Operation::Bind, libc::EADDRINUSE)
			.fail(2, Operation::Create, libc::EAFNOSUPPORT)
			.fail(3, Operation::Bind, libc::EACCES);

		let established = bind_candidates(&resolver, &transport, "", "80", Family::Unspecified, &BindOptions::default()).unwrap();
		assert_eq!(established.handle.port, 4);
		assert_eq!(transport.live.get(), 1);

		drop(established);
		assert_eq!(transport.live.get(), 0);
	}

	#[test]
	fn exhaustion_closes_everything() {
		let resolver = FakeResolver::ports(&[1, 2]);
		let transport = FakeTransport::default()
			.fail(1, Operation::Connect, libc::ENETUNREACH)
			.fail(2, Operation::Connect, libc::ECONNREFUSED);

		assert!(connect_candidates(&resolver, &transport, "host", "80").is_err());
		assert_eq!(transport.live.get(), 0);
	}

	#[test]
	fn exhaustion_reports_the_last_failure() {
		let resolver = FakeResolver::ports(&[1, 2]);
		let transport = FakeTransport::default()
			.fail(1, Operation::Bind, libc::EADDRINUSE)
			.fail(2, Operation::Bind, libc::EACCES);

		let err = bind_candidates(&resolver, &transport, "", "80", Family::Unspecified, &BindOptions::default())
			.unwrap_err();
		assert_eq!(err, Error::Socket(SocketError::new(Operation::Bind, libc::EACCES)));
	}

	#[test]
	fn last_failure_wins_across_steps() {
		let resolver = FakeResolver::ports(&[1, 2]);
		let transport = FakeTransport::default()
			.fail(1, Operation::Connect, libc::ECONNREFUSED)
			.fail(2, Operation::Create, libc::EMFILE);

		let err = connect_candidates(&resolver, &transport, "host", "80").unwrap_err();
		assert_eq!(err, Error::Socket(SocketError::new(Operation::Create, libc::EMFILE)));
	}

	#[test]
	fn resolution_failure_touches_no_socket() {
		let resolver = FakeResolver::failing(libc::EAI_SERVICE);
		let transport = FakeTransport::default();

		let err = connect_candidates(&resolver, &transport, "host", "nope").unwrap_err();

		assert!(matches!(err, Error::Resolution(ref e) if e.code == libc::EAI_SERVICE));
		assert_eq!(resolver.calls.get(), 1);
		assert!(transport.log().is_empty());
	}

	#[test]
	fn options_precede_bind_and_skip_connect() {
		let resolver = FakeResolver::ports(&[7]);
		let transport = FakeTransport::default();
		bind_candidates(&resolver, &transport, "", "7", Family::Ipv4, &BindOptions::default()).unwrap();
		assert_eq!(transport.log(), vec![("create", 7), ("options", 7), ("bind", 7)]);

		let transport = FakeTransport::default();
		connect_candidates(&resolver, &transport, "host", "7").unwrap();
		assert_eq!(transport.log(), vec![("create", 7), ("connect", 7)]);
	}

	#[test]
	fn empty_candidate_list_is_a_resolution_error() {
		let resolver = FakeResolver::ports(&[]);
		let transport = FakeTransport::default();
		let err = connect_candidates(&resolver, &transport, "host", "80").unwrap_err();
		assert_eq!(err.code(), libc::EAI_NONAME);
		assert!(matches!(err, Error::Resolution(_)));
	}
}
