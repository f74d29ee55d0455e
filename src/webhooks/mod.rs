//! Webhook ingestion: signature verification, payload parsing, and routing.

pub mod events;
pub mod parser;
pub mod router;
pub mod signature;

pub use events::{GitHubEvent, PushCommit, PushEvent};
pub use parser::{ParseError, parse_event};
pub use router::{Activity, EventRouter, InsightRequest, RouteOutcome};
pub use signature::{
    SignatureCheck, check_signature, compute_signature, format_signature_header,
    parse_signature_header, verify_signature,
};
