//! SMS fallback: wire codec (spec §4.2), transport collaborator (spec §6),
//! and escalation timers (spec §4.7).

pub mod codec;
pub mod escalation;
pub mod transport;

pub use codec::{decode, decode_gateway_reply, encode, GatewayReply, SmsRequest};
pub use escalation::{build_sms_text, CostProvider, CostWarningCallback, EscalationTimers};
pub use transport::{IncomingSms, SmsTransport};
