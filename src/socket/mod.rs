//! Socket creation, options, and the candidate attempt loop.
//!
//! - `raw` — one `socket()` per candidate, closed on drop
//! - `options` — best-effort options applied before `bind()`
//! - `attempt` — resolve, try candidates in order, commit the first success
//! - `tcp` — the owning socket object callers keep

mod attempt;
mod options;
mod raw;
mod tcp;

pub use self::attempt::{
	Established, Mode, SystemTransport, Transport,
	bind_candidates, connect_candidates, establish,
};
pub use self::options::{BindOptions, get_int_option, set_reuse_addr, set_reuse_port, set_v6only};
pub use self::raw::RawSocket;
pub use self::tcp::{Shutdown, TcpSocket};
