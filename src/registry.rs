//! C1 — digest registry: enumerate supported algorithms and normalize selection.

use std::collections::BTreeSet;
use std::fmt;

use digest::Digest;

use crate::hexutil::hex_encode;

/// The fixed, build-time set of recognized algorithm ids.
/// Declaration order doubles as the stable iteration/display order used
/// throughout the `text`/`sum`/`hashonly` formatters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlgorithmId {
    Crc32,
    XxHash64,
    Md4,
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Blake2b256,
    Blake2b512,
    Blake3,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Ed2k,
}

impl AlgorithmId {
    /// All fifteen descriptors, in declaration order.
    pub const ALL: [AlgorithmId; 15] = [
        AlgorithmId::Crc32,
        AlgorithmId::XxHash64,
        AlgorithmId::Md4,
        AlgorithmId::Md5,
        AlgorithmId::Sha1,
        AlgorithmId::Sha256,
        AlgorithmId::Sha512,
        AlgorithmId::Blake2b256,
        AlgorithmId::Blake2b512,
        AlgorithmId::Blake3,
        AlgorithmId::Sha3_224,
        AlgorithmId::Sha3_256,
        AlgorithmId::Sha3_384,
        AlgorithmId::Sha3_512,
        AlgorithmId::Ed2k,
    ];

    /// Lowercase wire/CLI identifier, e.g. `"sha3-256"`.
    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmId::Crc32 => "crc32",
            AlgorithmId::XxHash64 => "xxhash64",
            AlgorithmId::Md4 => "md4",
            AlgorithmId::Md5 => "md5",
            AlgorithmId::Sha1 => "sha1",
            AlgorithmId::Sha256 => "sha256",
            AlgorithmId::Sha512 => "sha512",
            AlgorithmId::Blake2b256 => "blake2b256",
            AlgorithmId::Blake2b512 => "blake2b512",
            AlgorithmId::Blake3 => "blake3",
            AlgorithmId::Sha3_224 => "sha3-224",
            AlgorithmId::Sha3_256 => "sha3-256",
            AlgorithmId::Sha3_384 => "sha3-384",
            AlgorithmId::Sha3_512 => "sha3-512",
            AlgorithmId::Ed2k => "ed2k",
        }
    }

    /// Parse a user-supplied name. Case-insensitive; returns `None` for
    /// anything that isn't a known id (callers silently drop unknowns,
    /// they never abort selection).
    pub fn parse(name: &str) -> Option<AlgorithmId> {
        let lower = name.to_ascii_lowercase();
        AlgorithmId::ALL.into_iter().find(|id| id.as_str() == lower)
    }

    /// Display name used by the `text` formatter (matches the casing the
    /// original tool used for the ids it already had: `Blake2b-256` etc.).
    pub fn display_name(self) -> &'static str {
        match self {
            AlgorithmId::Crc32 => "CRC32",
            AlgorithmId::XxHash64 => "XXHASH64",
            AlgorithmId::Md4 => "MD4",
            AlgorithmId::Md5 => "MD5",
            AlgorithmId::Sha1 => "SHA1",
            AlgorithmId::Sha256 => "SHA256",
            AlgorithmId::Sha512 => "SHA512",
            AlgorithmId::Blake2b256 => "Blake2b-256",
            AlgorithmId::Blake2b512 => "Blake2b-512",
            AlgorithmId::Blake3 => "BLAKE3",
            AlgorithmId::Sha3_224 => "SHA3-224",
            AlgorithmId::Sha3_256 => "SHA3-256",
            AlgorithmId::Sha3_384 => "SHA3-384",
            AlgorithmId::Sha3_512 => "SHA3-512",
            AlgorithmId::Ed2k => "ED2K",
        }
    }

    /// Output size in bytes, used to validate hex length invariants.
    pub fn output_size_bytes(self) -> usize {
        match self {
            AlgorithmId::Crc32 => 4,
            AlgorithmId::XxHash64 => 8,
            AlgorithmId::Md4 => 16,
            AlgorithmId::Md5 => 16,
            AlgorithmId::Sha1 => 20,
            AlgorithmId::Sha256 => 32,
            AlgorithmId::Sha512 => 64,
            AlgorithmId::Blake2b256 => 32,
            AlgorithmId::Blake2b512 => 64,
            AlgorithmId::Blake3 => 32,
            AlgorithmId::Sha3_224 => 28,
            AlgorithmId::Sha3_256 => 32,
            AlgorithmId::Sha3_384 => 48,
            AlgorithmId::Sha3_512 => 64,
            AlgorithmId::Ed2k => 16,
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm descriptor as named in the registry contract.
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmDescriptor {
    pub id: AlgorithmId,
    pub output_size_bytes: usize,
}

/// Look up a descriptor by id. Every `AlgorithmId` has one; this never fails.
pub fn lookup(id: AlgorithmId) -> AlgorithmDescriptor {
    AlgorithmDescriptor {
        id,
        output_size_bytes: id.output_size_bytes(),
    }
}

/// An immutable, deduplicated selection of algorithm ids, plus whether the
/// user supplied the `all` directive explicitly (the in-memory strategy's
/// parallel-fan-out rule excludes that case, see `hasher`).
#[derive(Debug, Clone)]
pub struct EnabledSet {
    ids: BTreeSet<AlgorithmId>,
    selected_all: bool,
}

impl EnabledSet {
    /// Lowercase each name, expand `all`, drop unknowns, collapse duplicates.
    pub fn normalize(names: &[String]) -> EnabledSet {
        let mut ids = BTreeSet::new();
        let mut selected_all = false;
        for name in names {
            if name.eq_ignore_ascii_case("all") {
                selected_all = true;
                ids.extend(AlgorithmId::ALL);
                continue;
            }
            if let Some(id) = AlgorithmId::parse(name) {
                ids.insert(id);
            }
            // Unknown names are silently ignored per the registry contract.
        }
        EnabledSet { ids, selected_all }
    }

    /// The default selection when `--hash` is not supplied.
    pub fn default_selection() -> EnabledSet {
        EnabledSet::normalize(&[
            "md5".to_string(),
            "sha1".to_string(),
            "sha256".to_string(),
            "sha512".to_string(),
        ])
    }

    pub fn is_enabled(&self, id: AlgorithmId) -> bool {
        self.ids.contains(&id)
    }

    pub fn selected_all(&self) -> bool {
        self.selected_all
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Enabled ids in the registry's declaration order.
    pub fn iter(&self) -> impl Iterator<Item = AlgorithmId> + '_ {
        self.ids.iter().copied()
    }
}

/// A stateful incremental byte absorber for one algorithm.
/// Not thread-safe; owned by exactly one absorber at a time.
pub trait Digester: Send {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// Construct a fresh, empty digester for `id`.
pub fn new_digester(id: AlgorithmId) -> Box<dyn Digester> {
    match id {
        AlgorithmId::Crc32 => Box::new(Crc32Digester(crc32fast::Hasher::new())),
        AlgorithmId::XxHash64 => Box::new(XxHash64Digester(xxhash_rust::xxh64::Xxh64::new(0))),
        AlgorithmId::Md4 => Box::new(GenericDigester(md4::Md4::new())),
        AlgorithmId::Md5 => Box::new(GenericDigester(md5::Md5::new())),
        AlgorithmId::Sha1 => Box::new(GenericDigester(sha1::Sha1::new())),
        AlgorithmId::Sha256 => Box::new(GenericDigester(sha2::Sha256::new())),
        AlgorithmId::Sha512 => Box::new(GenericDigester(sha2::Sha512::new())),
        AlgorithmId::Blake2b256 => Box::new(Blake2bDigester(
            blake2b_simd::Params::new().hash_length(32).to_state(),
        )),
        AlgorithmId::Blake2b512 => Box::new(Blake2bDigester(
            blake2b_simd::Params::new().hash_length(64).to_state(),
        )),
        AlgorithmId::Blake3 => Box::new(Blake3Digester(blake3::Hasher::new())),
        AlgorithmId::Sha3_224 => Box::new(GenericDigester(sha3::Sha3_224::new())),
        AlgorithmId::Sha3_256 => Box::new(GenericDigester(sha3::Sha3_256::new())),
        AlgorithmId::Sha3_384 => Box::new(GenericDigester(sha3::Sha3_384::new())),
        AlgorithmId::Sha3_512 => Box::new(GenericDigester(sha3::Sha3_512::new())),
        AlgorithmId::Ed2k => Box::new(Ed2kDigester::new()),
    }
}

/// Compute a digest over an already-fully-buffered slice and hex-encode it.
pub fn hash_slice(id: AlgorithmId, data: &[u8]) -> String {
    let mut digester = new_digester(id);
    digester.update(data);
    hex_encode(&digester.finalize())
}

/// Wraps any `digest::Digest` implementor (md4/md5/sha1/sha2/sha3) uniformly.
struct GenericDigester<D: Digest>(D);

impl<D: Digest + Send> Digester for GenericDigester<D> {
    fn update(&mut self, bytes: &[u8]) {
        Digest::update(&mut self.0, bytes);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

struct Crc32Digester(crc32fast::Hasher);

impl Digester for Crc32Digester {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_be_bytes().to_vec()
    }
}

struct XxHash64Digester(xxhash_rust::xxh64::Xxh64);

impl Digester for XxHash64Digester {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.digest().to_be_bytes().to_vec()
    }
}

struct Blake2bDigester(blake2b_simd::State);

impl Digester for Blake2bDigester {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finalize(mut self: Box<Self>) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }
}

struct Blake3Digester(blake3::Hasher);

impl Digester for Blake3Digester {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }
}

/// eD2k: MD4 over fixed 9,728,000-byte chunks, with a final MD4-of-the-chunk-digests
/// fold when more than one chunk was written. Ported from the chunking rule in
/// `go.felesatra.moe/hash/ed2k` (the upstream Go tool's eD2k dependency).
const ED2K_CHUNK_SIZE: u64 = 9_728_000;

struct Ed2kDigester {
    written: u64,
    hashlist: Vec<u8>,
    sub: md4::Md4,
}

impl Ed2kDigester {
    fn new() -> Self {
        Ed2kDigester {
            written: 0,
            hashlist: Vec::new(),
            sub: md4::Md4::new(),
        }
    }
}

impl Digester for Ed2kDigester {
    fn update(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let remainder = (ED2K_CHUNK_SIZE - self.written % ED2K_CHUNK_SIZE) as usize;
            let take = remainder.min(bytes.len());
            Digest::update(&mut self.sub, &bytes[..take]);
            self.written += take as u64;
            bytes = &bytes[take..];
            if self.written % ED2K_CHUNK_SIZE == 0 {
                let finished = std::mem::replace(&mut self.sub, md4::Md4::new());
                self.hashlist.extend_from_slice(&finished.finalize());
            }
        }
    }

    fn finalize(mut self: Box<Self>) -> Vec<u8> {
        if self.written == 0 {
            return self.sub.finalize().to_vec();
        }
        if self.written % ED2K_CHUNK_SIZE != 0 {
            self.hashlist
                .extend_from_slice(&self.sub.clone().finalize());
        }
        if self.written <= ED2K_CHUNK_SIZE {
            return self.hashlist;
        }
        let mut outer = md4::Md4::new();
        Digest::update(&mut outer, &self.hashlist);
        outer.finalize().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_expands_all_and_dedupes() {
        let set = EnabledSet::normalize(&[
            "md5".to_string(),
            "MD5".to_string(),
            "bogus".to_string(),
        ]);
        assert_eq!(set.len(), 1);
        assert!(set.is_enabled(AlgorithmId::Md5));
        assert!(!set.selected_all());

        let all = EnabledSet::normalize(&["all".to_string(), "md5".to_string()]);
        assert_eq!(all.len(), 15);
        assert!(all.selected_all());
    }

    #[test]
    fn empty_input_digests_match_canonical_values() {
        assert_eq!(
            hash_slice(AlgorithmId::Md5, b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hash_slice(AlgorithmId::Sha1, b""),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            hash_slice(AlgorithmId::Sha256, b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn known_vectors() {
        assert_eq!(
            hash_slice(AlgorithmId::Md5, b"hello\n"),
            "b1946ac92492d2347c6235b4d2611184"
        );
        assert_eq!(
            hash_slice(AlgorithmId::Sha1, b"hello\n"),
            "f572d396fae9206628714fb2ce00f72e94f2258f"
        );
    }

    #[test]
    fn ed2k_single_chunk_matches_plain_md4() {
        let ed2k = hash_slice(AlgorithmId::Ed2k, b"hello\n");
        let md4 = hash_slice(AlgorithmId::Md4, b"hello\n");
        assert_eq!(ed2k, md4);
    }

    #[test]
    fn output_sizes_match_hex_length() {
        for id in AlgorithmId::ALL {
            let hex = hash_slice(id, b"some bytes");
            assert_eq!(hex.len(), id.output_size_bytes() * 2, "{id}");
        }
    }
}
