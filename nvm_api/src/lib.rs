pub mod config;
pub mod constants;
pub mod error;
pub mod layout;
pub mod platform;
pub mod primitives;
pub mod status;

/// Identifier of an NVDIMM, as reported by the device library.
pub type DimmId = String;

/// Identifier of a processor socket.
pub type SocketId = u16;
