/// Thin wrapper so callers never need to reach for the `crc32c` crate
/// directly; keeps the polynomial choice (Castagnoli, per spec §3) in one
/// place.
pub fn crc32c(bytes: &[u8]) -> u32 {
    crc32c::crc32c(bytes)
}
