pub mod channel_sink;
pub mod console_sink;
pub mod file_sink;
pub mod registry;
pub mod sink_trait;

pub use channel_sink::{ChannelSink, SinkMessage};
pub use console_sink::ConsoleSink;
pub use file_sink::FileSink;
pub use registry::SinkRegistry;
pub use sink_trait::ResultSink;
