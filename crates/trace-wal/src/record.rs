// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use trace_types::{Encoding, Error, Result, TraceId};

/// One length-prefixed WAL record: a trace ID, its cut payload, and an
/// optional search-index entry summarizing that trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub trace_id: TraceId,
    pub payload: Vec<u8>,
    pub payload_encoding: Encoding,
    pub search_entry: Option<Vec<u8>>,
}

fn encoding_tag(encoding: Encoding) -> (u8, Option<u8>) {
    match encoding {
        Encoding::Proto => (0, None),
        Encoding::Json => (1, None),
        Encoding::Unknown(n) => (2, Some(n)),
    }
}

fn decode_encoding(tag: u8, extra: u8) -> Result<Encoding> {
    match tag {
        0 => Ok(Encoding::Proto),
        1 => Ok(Encoding::Json),
        2 => Ok(Encoding::Unknown(extra)),
        other => Err(Error::InvalidInput(format!("unknown encoding tag {other}"))),
    }
}

impl WalRecord {
    /// Encodes the record body (without the outer WAL length prefix).
    pub fn encode(&self) -> Vec<u8> {
        let (tag, extra) = encoding_tag(self.payload_encoding);
        let mut buf = Vec::with_capacity(16 + 2 + 4 + self.payload.len() + 5);
        buf.extend_from_slice(self.trace_id.as_bytes());
        buf.push(tag);
        buf.push(extra.unwrap_or(0));
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        match &self.search_entry {
            Some(entry) => {
                buf.push(1);
                buf.extend_from_slice(&(entry.len() as u32).to_le_bytes());
                buf.extend_from_slice(entry);
            }
            None => buf.push(0),
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 16 + 2 + 4 {
            return Err(Error::InvalidInput("WAL record too short".into()));
        }
        let trace_id = TraceId::from_bytes(buf[0..16].try_into().unwrap());
        let tag = buf[16];
        let extra = buf[17];
        let payload_encoding = decode_encoding(tag, extra)?;
        let payload_len = u32::from_le_bytes(buf[18..22].try_into().unwrap()) as usize;
        let mut cursor = 22;
        if buf.len() < cursor + payload_len + 1 {
            return Err(Error::InvalidInput("WAL record payload truncated".into()));
        }
        let payload = buf[cursor..cursor + payload_len].to_vec();
        cursor += payload_len;
        let has_search = buf[cursor];
        cursor += 1;
        let search_entry = if has_search == 1 {
            if buf.len() < cursor + 4 {
                return Err(Error::InvalidInput("WAL record search length truncated".into()));
            }
            let search_len = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap()) as usize;
            cursor += 4;
            if buf.len() < cursor + search_len {
                return Err(Error::InvalidInput("WAL record search entry truncated".into()));
            }
            Some(buf[cursor..cursor + search_len].to_vec())
        } else {
            None
        };
        Ok(Self {
            trace_id,
            payload,
            payload_encoding,
            search_entry,
        })
    }
}
