use crate::proto::recognizer_client::RecognizerClient;
use crate::proto::StreamingRequest;
use crate::transport::{InboundStream, OutboundStream, RecognizerTransport};
use async_trait::async_trait;
use sttstream_core::{
    ApiKey, ConnectionError, ErrorCode, RecognitionEvent, ServiceConfig, SessionError,
};
use tokio_stream::StreamExt;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// Recognition over a gRPC channel to the speech service, through the
/// generated `Recognizer` client.
///
/// The channel is established by [`connect`](Self::connect); each call to
/// [`recognize_streaming`](RecognizerTransport::recognize_streaming) opens a
/// new bidirectional stream on it, authenticated with the API key.
pub struct GrpcTransport {
    client: RecognizerClient<Channel>,
    authorization: MetadataValue<Ascii>,
    endpoint: String,
}

impl GrpcTransport {
    pub async fn connect(config: &ServiceConfig, api_key: &ApiKey) -> Result<Self, ConnectionError> {
        let authorization: MetadataValue<Ascii> = api_key
            .authorization_header()
            .parse()
            .map_err(|_| {
                ConnectionError::InvalidCredentials(
                    "API key contains characters not allowed in metadata".to_string(),
                )
            })?;

        let invalid = |reason: String| ConnectionError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason,
        };

        let mut endpoint = Endpoint::from_shared(config.endpoint.clone())
            .map_err(|e| invalid(e.to_string()))?
            .connect_timeout(config.connect_timeout());

        if endpoint.uri().scheme_str() == Some("https") {
            let host = endpoint
                .uri()
                .host()
                .ok_or_else(|| invalid("missing host".to_string()))?
                .to_string();
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots().domain_name(host))
                .map_err(|e| invalid(e.to_string()))?;
        }

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ConnectionError::Transport(format!("{}: {e}", config.endpoint)))?;

        tracing::info!(endpoint = %config.endpoint, "connected to recognition service");

        Ok(Self {
            client: RecognizerClient::new(channel),
            authorization,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecognizerTransport for GrpcTransport {
    fn name(&self) -> &str {
        "grpc"
    }

    async fn recognize_streaming(
        &mut self,
        outbound: OutboundStream,
    ) -> Result<InboundStream, SessionError> {
        let mut request = tonic::Request::new(outbound.map(StreamingRequest::from));
        request
            .metadata_mut()
            .insert("authorization", self.authorization.clone());

        let call: std::pin::Pin<
            Box<
                dyn std::future::Future<
                        Output = Result<
                            tonic::Response<tonic::codec::Streaming<crate::proto::StreamingResponse>>,
                            tonic::Status,
                        >,
                    > + Send
                    + '_,
            >,
        > = Box::pin(self.client.recognize_streaming(request));
        let response = call.await.map_err(session_error)?;

        let inbound = response
            .into_inner()
            .map(|item| item.map(RecognitionEvent::from).map_err(session_error));
        Ok(Box::pin(inbound))
    }
}

fn session_error(status: tonic::Status) -> SessionError {
    SessionError::new(error_code(status.code()), status.message())
}

fn error_code(code: tonic::Code) -> ErrorCode {
    use tonic::Code;

    match code {
        Code::Cancelled => ErrorCode::Cancelled,
        Code::InvalidArgument => ErrorCode::InvalidArgument,
        Code::DeadlineExceeded => ErrorCode::DeadlineExceeded,
        Code::NotFound => ErrorCode::NotFound,
        Code::AlreadyExists => ErrorCode::AlreadyExists,
        Code::PermissionDenied => ErrorCode::PermissionDenied,
        Code::ResourceExhausted => ErrorCode::ResourceExhausted,
        Code::FailedPrecondition => ErrorCode::FailedPrecondition,
        Code::Aborted => ErrorCode::Aborted,
        Code::OutOfRange => ErrorCode::OutOfRange,
        Code::Unimplemented => ErrorCode::Unimplemented,
        Code::Internal => ErrorCode::Internal,
        Code::Unavailable => ErrorCode::Unavailable,
        Code::DataLoss => ErrorCode::DataLoss,
        Code::Unauthenticated => ErrorCode::Unauthenticated,
        // An OK status never arrives as an error.
        Code::Ok | Code::Unknown => ErrorCode::Unknown,
    }
}
