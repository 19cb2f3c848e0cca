use sha1::Digest;

/// The hash families a hash-strategy or consistent-hash ring can be built
/// over. Consistent hashing always uses MD5 (matching the ring placement
/// formula); `HashFunction` only varies the plain hash strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunction {
    Md5,
    Sha1,
    Crc32,
}

/// First 4 bytes of the digest, big-endian, as an unsigned 32-bit value.
pub fn hash_u32(function: HashFunction, key: &str) -> u32 {
    let digest = match function {
        HashFunction::Md5 => md5::compute(key.as_bytes()).0.to_vec(),
        HashFunction::Sha1 => sha1::Sha1::digest(key.as_bytes()).to_vec(),
        HashFunction::Crc32 => return crc32fast::hash(key.as_bytes()),
    };
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// 32-bit MD5-derived position used for consistent-hash ring placement,
/// both for virtual nodes and for keys being routed.
pub fn md5_position(input: &str) -> u32 {
    hash_u32(HashFunction::Md5, input)
}
