//! Raw message decoding: MIME structure, charset repair, quality scoring.

pub mod charset;
pub mod message;
pub mod mime;

pub use charset::normalize_header;
pub use message::{DecodedAttachment, DecodedMessage};
pub use mime::{DecodeStrategy, MailParserStrategy, MailparseStrategy, MimeDecoder};
