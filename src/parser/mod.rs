//! Email parsing: notification bodies out of raw RFC 822 messages.

pub mod notification;
