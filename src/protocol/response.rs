//! Response definitions
//!
//! A decoded response is the ordered list of its fields. Field[0] is the
//! status; the typed accessors below turn the rest into results.

use bytes::Bytes;

use crate::error::{Result, SsdbError};
use super::CommandKind;

pub const STATUS_OK: &[u8] = b"ok";
pub const STATUS_NOT_FOUND: &[u8] = b"not_found";

/// Ordered key/value pairs from a multi-value reply
pub type Pairs = Vec<(Bytes, Bytes)>;

/// A response as it came off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    fields: Vec<Bytes>,
}

/// A response interpreted for its command category
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `not_found`: nothing there, not an error
    Empty,

    /// Write or delete accepted
    Done,

    Bool(bool),

    Int(i64),

    Pairs(Pairs),

    List(Vec<Bytes>),
}

impl Response {
    pub fn new(fields: Vec<Bytes>) -> Self {
        Self { fields }
    }

    /// Create an `ok` response with the given payload fields
    pub fn ok<I, F>(payload: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Bytes>,
    {
        let mut fields = vec![Bytes::from_static(STATUS_OK)];
        fields.extend(payload.into_iter().map(Into::into));
        Self { fields }
    }

    /// Create a `not_found` response
    pub fn not_found() -> Self {
        Self {
            fields: vec![Bytes::from_static(STATUS_NOT_FOUND)],
        }
    }

    /// All fields, status included
    pub fn fields(&self) -> &[Bytes] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Bytes> {
        self.fields
    }

    /// Field[0], empty if the response has no fields
    pub fn status(&self) -> &[u8] {
        self.fields.first().map(|f| f.as_ref()).unwrap_or(&[])
    }

    pub fn is_ok(&self) -> bool {
        self.status() == STATUS_OK
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == STATUS_NOT_FOUND
    }

    /// Fields after the status
    pub fn payload(&self) -> &[Bytes] {
        self.fields.get(1..).unwrap_or(&[])
    }

    /// Fail with a command error unless the status is `ok` or `not_found`
    pub fn check(self) -> Result<Self> {
        self.gate()?;
        Ok(self)
    }

    /// `Ok(true)` for `ok`, `Ok(false)` for `not_found`, command error otherwise
    fn gate(&self) -> Result<bool> {
        if self.is_ok() {
            Ok(true)
        } else if self.is_not_found() {
            Ok(false)
        } else if self.fields.is_empty() {
            Err(SsdbError::Protocol("response has no status field".to_string()))
        } else {
            Err(SsdbError::Command {
                status: String::from_utf8_lossy(self.status()).into_owned(),
                fields: self.fields.clone(),
            })
        }
    }

    // =========================================================================
    // Interpretation
    // =========================================================================

    /// Interpret this response according to the command category table
    pub fn interpret(&self, kind: CommandKind) -> Result<Reply> {
        if !self.gate()? {
            return Ok(Reply::Empty);
        }
        let reply = match kind {
            CommandKind::Write => Reply::Done,
            CommandKind::Predicate => Reply::Bool(self.flag()?),
            CommandKind::Counter => Reply::Int(self.integer()?),
            CommandKind::Pairs => Reply::Pairs(self.pairs()?),
            CommandKind::List => Reply::List(self.payload().to_vec()),
        };
        Ok(reply)
    }

    /// Write/delete: `true` when accepted, `false` on `not_found`
    pub fn into_done(self) -> Result<bool> {
        self.gate()
    }

    /// Boolean predicate: Field[1] == "1"; `false` on `not_found`
    pub fn into_bool(self) -> Result<bool> {
        if !self.gate()? {
            return Ok(false);
        }
        self.flag()
    }

    /// Integer in Field[1]; `None` on `not_found`
    pub fn into_int(self) -> Result<Option<i64>> {
        if !self.gate()? {
            return Ok(None);
        }
        self.integer().map(Some)
    }

    /// Single value: the last payload field; `None` on `not_found`
    pub fn into_value(self) -> Result<Option<Bytes>> {
        if !self.gate()? {
            return Ok(None);
        }
        Ok(self.payload().last().cloned())
    }

    /// Payload fields in order; empty on `not_found`
    pub fn into_list(self) -> Result<Vec<Bytes>> {
        if !self.gate()? {
            return Ok(Vec::new());
        }
        let mut fields = self.fields;
        fields.remove(0);
        Ok(fields)
    }

    /// Payload taken pairwise; empty on `not_found`
    pub fn into_pairs(self) -> Result<Pairs> {
        if !self.gate()? {
            return Ok(Vec::new());
        }
        self.pairs()
    }

    // -------------------------------------------------------------------------
    // Payload helpers (status already checked)
    // -------------------------------------------------------------------------

    fn first_value(&self) -> Result<&Bytes> {
        self.payload().first().ok_or_else(|| {
            SsdbError::Protocol("ok response is missing its value field".to_string())
        })
    }

    fn flag(&self) -> Result<bool> {
        Ok(self.first_value()?.as_ref() == b"1")
    }

    fn integer(&self) -> Result<i64> {
        let raw = self.first_value()?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                SsdbError::Protocol(format!(
                    "expected integer, got {:?}",
                    String::from_utf8_lossy(raw)
                ))
            })
    }

    fn pairs(&self) -> Result<Pairs> {
        let payload = self.payload();
        if payload.len() % 2 != 0 {
            return Err(SsdbError::Protocol(format!(
                "odd number of fields ({}) in key/value reply",
                payload.len()
            )));
        }
        Ok(payload
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect())
    }
}
