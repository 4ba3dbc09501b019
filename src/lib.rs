//! Bind or connect a TCP socket from a symbolic address.
//!
//! A node name and service may resolve to several addresses (IPv6 and IPv4,
//! say). Each is tried in resolver order and the first socket that binds or
//! connects is kept; every other socket is closed before the call returns.
//!
//! ```no_run
//! use netendpoint::{Family, TcpSocket};
//!
//! let mut server = TcpSocket::new();
//! server.bind("8080", Family::Unspecified)?;
//! server.listen()?;
//!
//! let mut client = TcpSocket::new();
//! client.connect("localhost", "8080")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod resolve;
pub mod socket;
mod addr;
mod error;

pub use self::addr::{Family, SockAddr};
pub use self::error::{Error, Operation, ResolutionError, Result, SocketError, errno};
pub use self::resolve::{Candidate, ResolutionRequest, Resolver, SystemResolver};
pub use self::socket::{BindOptions, Established, Mode, RawSocket, Shutdown, SystemTransport,
					   TcpSocket, Transport, bind_candidates, connect_candidates, establish};
