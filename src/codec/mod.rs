//! Binary message and parameter payload codecs.

mod message;
mod parameter;

pub use message::BinaryMessageDecoder;
pub use parameter::{
    DEFAULT_SENDER_CHANNEL, ParameterCodec, READ_REQUEST, READ_RESPONSE, RequestIdSequence,
    encode_response,
};
