//! Protocol Module
//!
//! Defines the wire protocol spoken with the server.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────────┬────┬──────────────────┬────┐
//! │ Len (ascii dec)  │ \n │  Payload (Len)   │ \n │
//! └──────────────────┴────┴──────────────────┴────┘
//! ```
//!
//! A request is the command name frame, one frame per argument payload, and a
//! terminating blank line. A response has the same shape, status first:
//!
//! ```text
//! set foo bar   ->  "3\nset\n3\nfoo\n3\nbar\n\n"
//! ok 1          <-  "2\nok\n1\n1\n\n"
//! ```
//!
//! ### Status Codes
//! - `ok`: success, payload follows
//! - `not_found`: nothing stored, treated as an empty result
//! - anything else (`error`, `fail`, `client_error`, ...): command error

mod argument;
mod command;
mod response;
mod codec;

pub use argument::Argument;
pub use command::{Command, CommandKind};
pub use response::{Pairs, Reply, Response, STATUS_NOT_FOUND, STATUS_OK};
pub use codec::{decode, encode_command, encode_fields, encode_response, MAX_FRAME_LEN};
