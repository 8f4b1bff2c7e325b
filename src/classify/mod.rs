//! Stateless classifiers over the decoded message and connection metadata.

pub mod attachments;
pub mod bounce;
pub mod spam;

pub use attachments::{AttachmentInfo, AttachmentSummary};
pub use bounce::{BounceOptions, is_bounce};
pub use spam::{SpamSignal, SpamStatus};
