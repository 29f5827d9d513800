//! Wire messages for the `speechkit.stt.v3.Recognizer` streaming call.
//!
//! Generated from `proto/speechkit/stt/v3/stt_service.proto`, which declares
//! only the subset of the service schema this client reads or writes.

use crate::transport::OutboundMessage;
use sttstream_core::{
    AudioEncoding, ProcessingMode, RecognitionEvent, RestrictionKind, SessionConfig,
};

tonic::include_proto!("speechkit.stt.v3");

use language_restriction_options::LanguageRestrictionType;
use recognition_model_options::AudioProcessingType;
use text_normalization_options::TextNormalization;

impl From<&SessionConfig> for StreamingOptions {
    fn from(config: &SessionConfig) -> Self {
        let audio_encoding = match config.encoding() {
            AudioEncoding::Linear16Pcm => raw_audio::AudioEncoding::Linear16Pcm,
        };
        let text_normalization = if config.normalization_enabled() {
            TextNormalization::Enabled
        } else {
            TextNormalization::Disabled
        };
        let audio_processing_type = match config.processing_mode() {
            ProcessingMode::RealTime => AudioProcessingType::RealTime,
            ProcessingMode::FullData => AudioProcessingType::FullData,
        };
        let language_restriction =
            config
                .language_restriction()
                .map(|restriction| LanguageRestrictionOptions {
                    restriction_type: restriction_type(restriction.kind) as i32,
                    language_code: restriction.languages.clone(),
                });

        StreamingOptions {
            recognition_model: Some(RecognitionModelOptions {
                model: config.model().to_string(),
                audio_format: Some(AudioFormatOptions {
                    audio_format: Some(audio_format_options::AudioFormat::RawAudio(RawAudio {
                        audio_encoding: audio_encoding as i32,
                        sample_rate_hertz: i64::from(config.sample_rate_hz()),
                        audio_channel_count: i64::from(config.channel_count()),
                    })),
                }),
                text_normalization: Some(TextNormalizationOptions {
                    text_normalization: text_normalization as i32,
                    profanity_filter: config.profanity_filter(),
                    literature_text: config.literature_text(),
                }),
                language_restriction,
                audio_processing_type: audio_processing_type as i32,
            }),
        }
    }
}

impl From<OutboundMessage> for StreamingRequest {
    fn from(message: OutboundMessage) -> Self {
        let event = match message {
            OutboundMessage::Config(config) => {
                streaming_request::Event::SessionOptions(StreamingOptions::from(&config))
            }
            OutboundMessage::Chunk(chunk) => {
                streaming_request::Event::Chunk(AudioChunk { data: chunk.data })
            }
        };
        StreamingRequest { event: Some(event) }
    }
}

fn restriction_type(kind: RestrictionKind) -> LanguageRestrictionType {
    match kind {
        RestrictionKind::Whitelist => LanguageRestrictionType::Whitelist,
        RestrictionKind::Blacklist => LanguageRestrictionType::Blacklist,
    }
}

fn texts(update: AlternativeUpdate) -> Vec<String> {
    update.alternatives.into_iter().map(|a| a.text).collect()
}

impl From<StreamingResponse> for RecognitionEvent {
    fn from(response: StreamingResponse) -> Self {
        use streaming_response::Event;

        match response.event {
            Some(Event::Partial(update)) => RecognitionEvent::PartialResult {
                alternatives: texts(update),
            },
            Some(Event::Final(update)) => RecognitionEvent::FinalResult {
                alternatives: texts(update),
            },
            Some(Event::EouUpdate(eou)) => RecognitionEvent::EndOfUtterance {
                time_ms: eou.time_ms,
            },
            Some(Event::FinalRefinement(refinement)) => RecognitionEvent::FinalRefinement {
                final_index: refinement.final_index,
                alternatives: match refinement.r#type {
                    Some(final_refinement::Type::NormalizedText(update)) => texts(update),
                    None => Vec::new(),
                },
            },
            Some(Event::StatusCode(status)) => match CodeType::try_from(status.code_type) {
                Ok(CodeType::Warning) => RecognitionEvent::SessionError {
                    message: status.message,
                },
                Ok(CodeType::Closed) => RecognitionEvent::SessionEnd {
                    message: status.message,
                },
                _ => RecognitionEvent::Other,
            },
            None => RecognitionEvent::Other,
        }
    }
}
