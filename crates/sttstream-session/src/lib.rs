pub mod grpc;
pub mod proto;
pub mod scripted;
pub mod session;
pub mod transport;

pub use grpc::GrpcTransport;
pub use scripted::{ScriptStep, ScriptedTransport};
pub use session::{SessionOptions, SessionReport, StreamingSession};
pub use transport::{InboundStream, OutboundMessage, OutboundStream, RecognizerTransport};
