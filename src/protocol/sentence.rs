//! Sentence framing for the wire protocol.
//!
//! Every message on the wire is one ASCII line of the form
//! `$<payload>*<CS>\r\n`, where the payload is a comma-separated list whose
//! first element names the sentence and `<CS>` is the XOR of all payload
//! bytes rendered as two uppercase hex digits.

use crate::error::{Error, Result};

/// XOR checksum over the payload bytes (everything between `$` and `*`).
pub fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0, |acc, b| acc ^ b)
}

/// Wrap a payload into a framed sentence.
///
/// `unframe` recovers the payload split on commas for any payload free of
/// `$`, `*` and line terminators.
pub fn frame(payload: &str) -> String {
    format!("${}*{:02X}\r\n", payload, checksum(payload))
}

/// One unframed sentence: the leading prefix plus the remaining fields.
///
/// Fields borrow from the input line; empty fields are preserved so that
/// positional access matches the wire layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSentence<'a> {
    pub prefix: &'a str,
    pub fields: Vec<&'a str>,
}

/// Split a received line into prefix and fields.
///
/// Strips a leading `$`, drops everything from the first `*` (the checksum
/// is carried but not compared; real NMEA consumers are lenient and the
/// vehicle keeps that behavior), and splits the rest on `,`. A line with no
/// payload at all is malformed and the caller drops it.
pub fn unframe(line: &str) -> Result<RawSentence<'_>> {
    let trimmed = line.trim();
    let body = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let body = match body.split_once('*') {
        Some((payload, _checksum)) => payload,
        None => body,
    };

    let mut parts = body.split(',');
    // split always yields at least one element
    let prefix = parts.next().unwrap_or("");
    if prefix.is_empty() {
        return Err(Error::MalformedSentence(format!("empty prefix in {:?}", line)));
    }

    Ok(RawSentence {
        prefix,
        fields: parts.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_values() {
        assert_eq!(checksum("A"), 0x41);
        assert_eq!(checksum("AB"), 0x41 ^ 0x42);
        assert_eq!(checksum(""), 0);
    }

    #[test]
    fn test_frame_exact_bytes() {
        assert_eq!(frame("AB"), "$AB*03\r\n");
        assert_eq!(frame("PSEAC,L,0,0,0,"), "$PSEAC,L,0,0,0,*14\r\n");
    }

    #[test]
    fn test_unframe_round_trip() {
        let payloads = [
            "PSEAC,T,0,50,-10,",
            "PSEAC,R,,,,",
            "OIWPL,2545.5000,N,08022.4318,W,0",
            "PSEAR,0,000,70,0,000",
            "GPGGA,123456.00,2545.49956,N,08022.43184,W,1,08,1.0,0.0,M,0.0,M,,",
        ];
        for payload in payloads {
            let framed = frame(payload);
            let raw = unframe(&framed).unwrap();
            let mut expected = payload.split(',');
            assert_eq!(raw.prefix, expected.next().unwrap());
            assert_eq!(raw.fields, expected.collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_unframe_preserves_empty_fields() {
        let raw = unframe("$PSEAC,R,,,,*3A\r\n").unwrap();
        assert_eq!(raw.prefix, "PSEAC");
        assert_eq!(raw.fields, vec!["R", "", "", "", ""]);
    }

    #[test]
    fn test_unframe_accepts_checksum_mismatch() {
        // Receivers are deliberately lenient: the checksum is stripped, not
        // verified.
        let raw = unframe("$PSEAD,L,0.0,0,0*FF\r\n").unwrap();
        assert_eq!(raw.prefix, "PSEAD");
        assert_eq!(raw.fields, vec!["L", "0.0", "0", "0"]);
    }

    #[test]
    fn test_unframe_tolerates_missing_dollar_and_checksum() {
        let raw = unframe("PSEAR,0,000,50,0,000").unwrap();
        assert_eq!(raw.prefix, "PSEAR");
        assert_eq!(raw.fields.len(), 5);
    }

    #[test]
    fn test_unframe_rejects_blank_lines() {
        assert!(unframe("").is_err());
        assert!(unframe("\r\n").is_err());
        assert!(unframe("$").is_err());
        assert!(unframe("$*00").is_err());
        assert!(unframe(",T,0").is_err());
    }
}
