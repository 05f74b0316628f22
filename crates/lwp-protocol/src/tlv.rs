use crate::error::FrameError;

/// One produce/fetch payload record (spec §3). Known types decode into their
/// named variant; anything in the extension range round-trips through
/// `Unknown`, carrying its original type code, preserving forward
/// compatibility (spec §9, open question iii).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    RawData(Vec<u8>),
    Json(String),
    MessagePack(Vec<u8>),
    KeyValue { key: Vec<u8>, value: Vec<u8> },
    Timestamped { timestamp_ns: u64, value: Vec<u8> },
    Null,
    /// Unrecognized type code in the reserved range, carried verbatim.
    Unknown { code: u8, value: Vec<u8> },
}

const TYPE_RAW_DATA: u8 = 0x01;
const TYPE_JSON: u8 = 0x02;
const TYPE_MESSAGE_PACK: u8 = 0x03;
const TYPE_KEY_VALUE: u8 = 0x10;
const TYPE_TIMESTAMPED: u8 = 0x11;
const TYPE_NULL: u8 = 0xFF;

impl Record {
    fn type_code(&self) -> u8 {
        match self {
            Self::RawData(_) => TYPE_RAW_DATA,
            Self::Json(_) => TYPE_JSON,
            Self::MessagePack(_) => TYPE_MESSAGE_PACK,
            Self::KeyValue { .. } => TYPE_KEY_VALUE,
            Self::Timestamped { .. } => TYPE_TIMESTAMPED,
            Self::Null => TYPE_NULL,
            Self::Unknown { code, .. } => *code,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        match self {
            Self::RawData(bytes) | Self::MessagePack(bytes) | Self::Unknown { value: bytes, .. } => bytes.clone(),
            Self::Json(text) => text.clone().into_bytes(),
            Self::KeyValue { key, value } => {
                let mut bytes = Vec::with_capacity(2 + key.len() + value.len());
                bytes.extend_from_slice(&(key.len() as u16).to_le_bytes());
                bytes.extend_from_slice(key);
                bytes.extend_from_slice(value);
                bytes
            }
            Self::Timestamped { timestamp_ns, value } => {
                let mut bytes = Vec::with_capacity(8 + value.len());
                bytes.extend_from_slice(&timestamp_ns.to_le_bytes());
                bytes.extend_from_slice(value);
                bytes
            }
            Self::Null => Vec::new(),
        }
    }
}

/// Encodes a single TLV record: `type: u8`, `length: u32` (LE), `value`.
pub fn encode_tlv(record: &Record) -> Vec<u8> {
    let value = record.value_bytes();
    let mut bytes = Vec::with_capacity(1 + 4 + value.len());
    bytes.push(record.type_code());
    bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&value);
    bytes
}

/// Decodes every record in `buf`, which must be exactly consumed (spec §3
/// invariant iv, §8 property 4). No partial results are returned on error.
pub fn decode_tlv_stream(buf: &[u8]) -> Result<Vec<Record>, FrameError> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos < buf.len() {
        if buf.len() - pos < 5 {
            return Err(FrameError::TlvOverrun);
        }
        let type_code = buf[pos];
        let len = u32::from_le_bytes(buf[pos + 1..pos + 5].try_into().unwrap()) as usize;
        let value_start = pos + 5;
        let value_end = value_start
            .checked_add(len)
            .filter(|&end| end <= buf.len())
            .ok_or(FrameError::TlvOverrun)?;

        let value = &buf[value_start..value_end];
        records.push(decode_record(type_code, value)?);
        pos = value_end;
    }

    if pos != buf.len() {
        return Err(FrameError::TlvTrailingBytes(buf.len() - pos));
    }

    Ok(records)
}

fn decode_record(type_code: u8, value: &[u8]) -> Result<Record, FrameError> {
    Ok(match type_code {
        TYPE_RAW_DATA => Record::RawData(value.to_vec()),
        TYPE_JSON => Record::Json(String::from_utf8_lossy(value).into_owned()),
        TYPE_MESSAGE_PACK => Record::MessagePack(value.to_vec()),
        TYPE_KEY_VALUE => {
            if value.len() < 2 {
                return Err(FrameError::TlvOverrun);
            }
            let key_len = u16::from_le_bytes(value[0..2].try_into().unwrap()) as usize;
            if value.len() < 2 + key_len {
                return Err(FrameError::TlvOverrun);
            }
            let key = value[2..2 + key_len].to_vec();
            let value = value[2 + key_len..].to_vec();
            Record::KeyValue { key, value }
        }
        TYPE_TIMESTAMPED => {
            if value.len() < 8 {
                return Err(FrameError::TlvOverrun);
            }
            let timestamp_ns = u64::from_le_bytes(value[0..8].try_into().unwrap());
            let value = value[8..].to_vec();
            Record::Timestamped { timestamp_ns, value }
        }
        TYPE_NULL => Record::Null,
        other => Record::Unknown { code: other, value: value.to_vec() },
    })
}

/// Encodes a full record sequence, the unit that a produce/fetch payload
/// carries (optionally compressed as a whole before being written as the
/// frame payload).
pub fn encode_tlv_stream(records: &[Record]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for record in records {
        bytes.extend(encode_tlv(record));
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(record: Record) {
        let encoded = encode_tlv(&record);
        let decoded = decode_tlv_stream(&encoded).expect("valid tlv");
        assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn round_trips_every_known_type() {
        round_trip(Record::RawData(vec![1, 2, 3]));
        round_trip(Record::Json("{\"a\":1}".to_string()));
        round_trip(Record::MessagePack(vec![0x81, 0xa1, b'a', 0x01]));
        round_trip(Record::KeyValue { key: b"k".to_vec(), value: b"v".to_vec() });
        round_trip(Record::Timestamped { timestamp_ns: 1234, value: b"v".to_vec() });
        round_trip(Record::Null);
    }

    #[test]
    fn unknown_type_round_trips_as_itself() {
        round_trip(Record::Unknown { code: 0x42, value: vec![9, 9] });
    }

    #[test]
    fn multiple_records_in_one_buffer() {
        let records = vec![Record::RawData(b"hello lwp".to_vec()), Record::Null];
        let encoded = encode_tlv_stream(&records);
        assert_eq!(decode_tlv_stream(&encoded).unwrap(), records);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = encode_tlv(&Record::Null);
        encoded.push(0xAB);
        assert!(matches!(decode_tlv_stream(&encoded), Err(FrameError::TlvTrailingBytes(1))));
    }

    #[test]
    fn truncated_length_prefix_is_rejected() {
        let encoded = vec![TYPE_RAW_DATA, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(decode_tlv_stream(&encoded), Err(FrameError::TlvOverrun)));
    }
}
