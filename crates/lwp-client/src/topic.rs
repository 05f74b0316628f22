use lwp_protocol::{decode_tlv_stream, encode_tlv_stream, LwpError, Record};

/// Topic metadata as returned by CREATE_TOPIC/GET_TOPIC/LIST_TOPICS (spec §9
/// "Dynamic topic metadata", re-expressed as a typed record per SPEC_FULL.md
/// open question (iv)). Topic-management wire bodies are an external
/// collaborator per spec.md §1's scope note, so this crate owns a small,
/// self-contained KeyValue-TLV encoding for them rather than inventing a
/// second codec layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicInfo {
    pub id: u64,
    pub name: String,
    pub created_at_ns: u64,
    pub max_age_secs: Option<u64>,
    pub max_bytes: Option<u64>,
}

pub(crate) fn create_topic_request(name: &str, max_age_secs: Option<u64>, max_bytes: Option<u64>) -> Vec<u8> {
    let mut records = vec![Record::KeyValue { key: b"name".to_vec(), value: name.as_bytes().to_vec() }];
    push_retention(&mut records, max_age_secs, max_bytes);
    encode_tlv_stream(&records)
}

pub(crate) fn set_retention_request(max_age_secs: Option<u64>, max_bytes: Option<u64>) -> Vec<u8> {
    let mut records = Vec::new();
    push_retention(&mut records, max_age_secs, max_bytes);
    encode_tlv_stream(&records)
}

fn push_retention(records: &mut Vec<Record>, max_age_secs: Option<u64>, max_bytes: Option<u64>) {
    if let Some(v) = max_age_secs {
        records.push(Record::KeyValue { key: b"max_age_secs".to_vec(), value: v.to_le_bytes().to_vec() });
    }
    if let Some(v) = max_bytes {
        records.push(Record::KeyValue { key: b"max_bytes".to_vec(), value: v.to_le_bytes().to_vec() });
    }
}

pub(crate) fn decode_topic_info(payload: &[u8]) -> Result<TopicInfo, LwpError> {
    let mut id = None;
    let mut name = None;
    let mut created_at_ns = 0u64;
    let mut max_age_secs = None;
    let mut max_bytes = None;

    for record in decode_tlv_stream(payload)? {
        let Record::KeyValue { key, value } = record else { continue };
        match key.as_slice() {
            b"id" => id = read_u64(&value),
            b"name" => name = Some(String::from_utf8_lossy(&value).into_owned()),
            b"created_at_ns" => created_at_ns = read_u64(&value).unwrap_or(0),
            b"max_age_secs" => max_age_secs = read_u64(&value),
            b"max_bytes" => max_bytes = read_u64(&value),
            _ => {}
        }
    }

    Ok(TopicInfo {
        id: id.ok_or_else(|| LwpError::Internal("topic response missing id".to_string()))?,
        name: name.ok_or_else(|| LwpError::Internal("topic response missing name".to_string()))?,
        created_at_ns,
        max_age_secs,
        max_bytes,
    })
}

/// LIST_TOPICS concatenates each topic's KeyValue-TLV block prefixed with its
/// own `u32` length, so the list can be walked without re-parsing a mixed
/// stream of unrelated records.
pub(crate) fn decode_topic_list(payload: &[u8]) -> Result<Vec<TopicInfo>, LwpError> {
    let mut topics = Vec::new();
    let mut pos = 0usize;
    while pos < payload.len() {
        if payload.len() - pos < 4 {
            return Err(LwpError::Internal("truncated topic list".to_string()));
        }
        let len = u32::from_le_bytes(payload[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let end = pos
            .checked_add(len)
            .filter(|&end| end <= payload.len())
            .ok_or_else(|| LwpError::Internal("truncated topic list entry".to_string()))?;
        topics.push(decode_topic_info(&payload[pos..end])?);
        pos = end;
    }
    Ok(topics)
}

fn read_u64(value: &[u8]) -> Option<u64> {
    value.try_into().ok().map(u64::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_info_round_trips_through_the_create_request_shape() {
        let request = create_topic_request("events", Some(86400), None);
        let records = decode_tlv_stream(&request).unwrap();
        assert_eq!(records[0], Record::KeyValue { key: b"name".to_vec(), value: b"events".to_vec() });
    }

    #[test]
    fn decode_topic_info_reads_back_every_field() {
        let records = vec![
            Record::KeyValue { key: b"id".to_vec(), value: 7u64.to_le_bytes().to_vec() },
            Record::KeyValue { key: b"name".to_vec(), value: b"events".to_vec() },
            Record::KeyValue { key: b"created_at_ns".to_vec(), value: 123u64.to_le_bytes().to_vec() },
            Record::KeyValue { key: b"max_bytes".to_vec(), value: 4096u64.to_le_bytes().to_vec() },
        ];
        let payload = encode_tlv_stream(&records);
        let info = decode_topic_info(&payload).unwrap();
        assert_eq!(
            info,
            TopicInfo { id: 7, name: "events".to_string(), created_at_ns: 123, max_age_secs: None, max_bytes: Some(4096) }
        );
    }

    #[test]
    fn decode_topic_list_walks_length_prefixed_entries() {
        let a = encode_tlv_stream(&[
            Record::KeyValue { key: b"id".to_vec(), value: 1u64.to_le_bytes().to_vec() },
            Record::KeyValue { key: b"name".to_vec(), value: b"a".to_vec() },
        ]);
        let b = encode_tlv_stream(&[
            Record::KeyValue { key: b"id".to_vec(), value: 2u64.to_le_bytes().to_vec() },
            Record::KeyValue { key: b"name".to_vec(), value: b"b".to_vec() },
        ]);
        let mut payload = Vec::new();
        for block in [&a, &b] {
            payload.extend_from_slice(&(block.len() as u32).to_le_bytes());
            payload.extend_from_slice(block);
        }

        let topics = decode_topic_list(&payload).unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "a");
        assert_eq!(topics[1].name, "b");
    }
}
