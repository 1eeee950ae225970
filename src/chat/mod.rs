//! Chat session gate.
//!
//! Per-connection message handling in front of the external agent runtime:
//! decode the client query, consult the shared rate limiter, run the agent
//! under a deadline, and turn every outcome into a client message. The web
//! server that carries these messages lives outside this crate.

mod messages;
mod session;

pub use messages::{ClientQuery, ResponseData, ServerMessage};
pub use session::{AgentReply, AgentRuntime, ChatSession};
