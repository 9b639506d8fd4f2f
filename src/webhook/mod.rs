//! Messaging webhook front end of the agent.
//!
//! Inbound WhatsApp messages arrive as form posts, are optionally checked
//! against the provider signature, answered by the [`Agent`](crate::agent::Agent)
//! and returned as TwiML.

mod http;
mod signature;

pub use http::{router, serve, twiml, xml_escape, WebhookState};
pub use signature::{SignatureError, SignatureValidator, SIGNATURE_HEADER};
