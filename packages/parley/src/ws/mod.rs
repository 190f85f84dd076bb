//! Chat WebSocket transport
//!
//! One WebSocket per client identity. Routing, presence and persistence all
//! happen in the hub; this module only moves frames.

mod handler;

pub use handler::handle_chat_ws;
