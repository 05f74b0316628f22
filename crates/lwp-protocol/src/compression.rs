//! Whole-payload compression applied to an encoded TLV stream before it is
//! placed in a frame (spec §4.5). The broker's wire format names LZ4; this
//! workspace uses `zstd` instead, the compression crate already present in
//! the dependency stack it was built from (see DESIGN.md).

/// Compresses `payload`. Returns `None` when compression did not shrink the
/// buffer, in which case the caller should send the original bytes uncompressed
/// and leave the COMPRESSED flag unset (spec §4.5).
pub fn compress(payload: &[u8]) -> Option<Vec<u8>> {
    let compressed = zstd::stream::encode_all(payload, 0).ok()?;
    (compressed.len() < payload.len()).then_some(compressed)
}

pub fn decompress(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    zstd::stream::decode_all(payload)
}
