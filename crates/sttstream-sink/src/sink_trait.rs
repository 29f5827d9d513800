use async_trait::async_trait;
use sttstream_core::SinkError;

/// Consumer of recognized text.
///
/// Implementations are created via [`SinkRegistry`](crate::SinkRegistry) and
/// receive the ordered alternatives of every final refinement through
/// [`accept`](Self::accept), once per event, in delivery order.
#[async_trait]
pub trait ResultSink: Send {
    /// Returns the sink's registry name (e.g. `"console"`, `"file"`).
    fn name(&self) -> &str;
    /// One-time initialisation with sink-specific TOML configuration.
    async fn initialize(&mut self, config: toml::Value) -> Result<(), SinkError>;
    /// Deliver the alternatives of one final refinement, order preserved.
    async fn accept(&mut self, texts: &[String]) -> Result<(), SinkError>;
    /// Interim hypotheses. Only called when partial results are enabled.
    async fn accept_partial(&mut self, _texts: &[String]) -> Result<(), SinkError> {
        Ok(())
    }
    /// Returns `true` if the sink is currently able to accept text.
    fn is_healthy(&self) -> bool;
    /// Flush and release resources.
    async fn shutdown(&mut self) -> Result<(), SinkError>;
}
