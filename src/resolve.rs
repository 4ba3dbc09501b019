//! Name and service resolution.
//!
//! Turns a symbolic (node, service, family) triple into the ordered list of
//! concrete addresses a socket may be bound or connected to. The order is the
//! resolver's and is never changed here: callers try candidates front to back.

use std::ffi::CString;

use crate::addr::{Family, SockAddr};
use crate::error::ResolutionError;

/// One resolution call's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
	/// Host name or literal address. `None` means the wildcard address when
	/// `passive` is set.
	pub node: Option<String>,
	/// Port number or service name. Must not be empty.
	pub service: String,
	pub family: Family,
	/// Set for listening sockets (`AI_PASSIVE`).
	pub passive: bool,
}

impl ResolutionRequest {
	/// Request for a listening socket. An empty `node` selects the wildcard
	/// address.
	pub fn passive(node: &str, service: &str, family: Family) -> Self {
		Self {
			node: if node.is_empty() { None } else { Some(node.to_owned()) },
			service: service.to_owned(),
			family,
			passive: true,
		}
	}

	/// Request for an outbound connection. Family is left to the resolver.
	pub fn active(node: &str, service: &str) -> Self {
		Self {
			node: if node.is_empty() { None } else { Some(node.to_owned()) },
			service: service.to_owned(),
			family: Family::Unspecified,
			passive: false,
		}
	}
}

/// A concrete address a socket can be created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
	pub family: Family,
	/// `SOCK_STREAM` for everything this crate resolves.
	pub socktype: libc::c_int,
	pub protocol: libc::c_int,
	pub addr: SockAddr,
}

/// Source of candidates.
///
/// Implementations must return a non-empty list in preference order, or an
/// error. They must not create sockets.
pub trait Resolver {
	fn resolve(&self, request: &ResolutionRequest) -> Result<Vec<Candidate>, ResolutionError>;
}

/// Resolver backed by the system's `getaddrinfo()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
	fn resolve(&self, request: &ResolutionRequest) -> Result<Vec<Candidate>, ResolutionError> {
		if request.service.is_empty() {
			return Err(rejected("empty service"));
		}
		if request.node.is_none() && !request.passive {
			return Err(rejected("node is required to connect"));
		}

		let service = CString::new(request.service.as_str())
			.map_err(|_| rejected("service contains NUL byte"))?;
		let node = match &request.node {
			Some(node) => Some(CString::new(node.as_str()).map_err(|_| rejected("node contains NUL byte"))?),
			None => None,
		};

		let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
		hints.ai_family = request.family.raw();
		hints.ai_socktype = libc::SOCK_STREAM;
		hints.ai_protocol = libc::IPPROTO_TCP;
		if request.passive {
			hints.ai_flags = libc::AI_PASSIVE;
		}

		let mut head: *mut libc::addrinfo = std::ptr::null_mut();
		let rc = unsafe {
			libc::getaddrinfo(
				node.as_ref().map_or(std::ptr::null(), |n| n.as_ptr()),
				service.as_ptr(),
				&hints,
				&mut head,
			)
		};
		if rc != 0 {
			return Err(ResolutionError::from_gai(rc));
		}

		let list = AddrInfoList { head };
		let candidates: Vec<Candidate> = list.iter().filter_map(candidate_from).collect();
		drop(list);

		if candidates.is_empty() {
			return Err(ResolutionError::from_gai(libc::EAI_NONAME));
		}
		Ok(candidates)
	}
}

fn rejected(reason: &str) -> ResolutionError {
	ResolutionError {
		code: libc::EAI_NONAME,
		message: reason.to_owned(),
	}
}

fn candidate_from(info: &libc::addrinfo) -> Option<Candidate> {
	let family = Family::from_raw(info.ai_family)?;
	let addr = unsafe { SockAddr::from_raw(info.ai_addr, info.ai_addrlen) }?;
	Some(Candidate {
		family,
		socktype: info.ai_socktype,
		protocol: info.ai_protocol,
		addr,
	})
}

/// Owns a `getaddrinfo()` result and frees it exactly once.
struct AddrInfoList {
	head: *mut libc::addrinfo,
}

impl AddrInfoList {
	fn iter(&self) -> impl Iterator<Item = &libc::addrinfo> + '_ {
		let mut cur = self.head;
		std::iter::from_fn(move || {
			if cur.is_null() {
				return None;
			}
			let info = unsafe { &*cur };
			cur = info.ai_next;
			Some(info)
		})
	}
}

impl Drop for AddrInfoList {
	fn drop(&mut self) {
		if !self.head.is_null() {
			unsafe { libc::freeaddrinfo(self.head) };
		}
	}
}

/*
getaddrinfo() hands back a linked list allocated by libc. Every entry is
copied into an owned Candidate while the list is alive, then the guard frees
it. Nothing borrowed from the list escapes resolve(), so there is no path on
which it is freed twice or leaked.
*/

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::SocketAddr;

	#[test]
	fn numeric_host_resolves_to_one_candidate() {
		let candidates = SystemResolver
			.resolve(&ResolutionRequest::active("127.0.0.1", "8080"))
			.unwrap();
		assert_eq!(candidates.len(), 1);
		let candidate = candidates[0];
		assert_eq!(candidate.family, Family::Ipv4);
		assert_eq!(candidate.socktype, libc::SOCK_STREAM);
		assert_eq!(candidate.protocol, libc::IPPROTO_TCP);
		assert_eq!(candidate.addr.to_std(), Some("127.0.0.1:8080".parse::<SocketAddr>().unwrap()));
	}

	#[test]
	fn passive_without_node_is_wildcard() {
		let candidates = SystemResolver
			.resolve(&ResolutionRequest::passive("", "0", Family::Ipv4))
			.unwrap();
		assert!(!candidates.is_empty());
		for candidate in candidates {
			let addr = candidate.addr.to_std().unwrap();
			assert!(addr.ip().is_unspecified());
			assert_eq!(addr.port(), 0);
		}
	}

	#[test]
	fn unspecified_family_keeps_only_inet_candidates() {
		let candidates = SystemResolver
			.resolve(&ResolutionRequest::passive("", "7000", Family::Unspecified))
			.unwrap();
		assert!(!candidates.is_empty());
		assert!(candidates.iter().all(|c| c.family != Family::Unspecified));
	}

	#[test]
	fn unknown_service_fails() {
		let err = SystemResolver
			.resolve(&ResolutionRequest::active("127.0.0.1", "no-such-service-here"))
			.unwrap_err();
		assert_ne!(err.code, 0);
		assert!(!err.message.is_empty());
	}

	#[test]
	fn empty_service_is_rejected() {
		let err = SystemResolver
			.resolve(&ResolutionRequest::passive("", "", Family::Unspecified))
			.unwrap_err();
		assert_eq!(err.code, libc::EAI_NONAME);
	}

	#[test]
	fn connect_requires_node() {
		let err = SystemResolver
			.resolve(&ResolutionRequest::active("", "80"))
			.unwrap_err();
		assert_eq!(err.code, libc::EAI_NONAME);
	}

	#[test]
	fn interior_nul_is_rejected() {
		let err = SystemResolver
			.resolve(&ResolutionRequest::active("local\0host", "80"))
			.unwrap_err();
		assert_eq!(err.code, libc::EAI_NONAME);
		assert!(err.message.contains("NUL"));
	}

	#[test]
	fn family_mismatch_fails() {
		let request = ResolutionRequest {
			node: Some("127.0.0.1".into()),
			service: "80".into(),
			family: Family::Ipv6,
			passive: false,
		};
		assert!(SystemResolver.resolve(&request).is_err());
	}
}
