//! The per-file result record, and its `text`/`sum`/`hashonly`/`json` renderings.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::registry::AlgorithmId;

/// One file's hashing outcome: the digests that were enabled for it, plus
/// the metadata the formatters need (size, and mtime when capture is on).
#[derive(Debug, Clone)]
pub struct HashRecord {
    pub path: String,
    pub bytes: u64,
    pub mtime: Option<chrono::DateTime<chrono::Utc>>,
    pub digests: BTreeMap<AlgorithmId, String>,
}

impl HashRecord {
    pub fn new(path: String, bytes: u64, mtime: Option<chrono::DateTime<chrono::Utc>>) -> Self {
        HashRecord {
            path,
            bytes,
            mtime,
            digests: BTreeMap::new(),
        }
    }

    pub fn digest(&self, id: AlgorithmId) -> Option<&str> {
        self.digests.get(&id).map(String::as_str)
    }
}

/// `json` field names are PascalCase and hyphen-free, matching the original
/// tool's struct tags — deliberately distinct from the `text` formatter's
/// hyphenated display names (`Blake2b-256` vs `Blake2b256`).
fn json_field_name(id: AlgorithmId) -> &'static str {
    match id {
        AlgorithmId::Crc32 => "CRC32",
        AlgorithmId::XxHash64 => "XxHash64",
        AlgorithmId::Md4 => "MD4",
        AlgorithmId::Md5 => "MD5",
        AlgorithmId::Sha1 => "SHA1",
        AlgorithmId::Sha256 => "SHA256",
        AlgorithmId::Sha512 => "SHA512",
        AlgorithmId::Blake2b256 => "Blake2b256",
        AlgorithmId::Blake2b512 => "Blake2b512",
        AlgorithmId::Blake3 => "Blake3",
        AlgorithmId::Sha3_224 => "Sha3224",
        AlgorithmId::Sha3_256 => "Sha3256",
        AlgorithmId::Sha3_384 => "Sha3384",
        AlgorithmId::Sha3_512 => "Sha3512",
        AlgorithmId::Ed2k => "ED2K",
    }
}

impl Serialize for HashRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let field_count = 3 + self.digests.len();
        let mut state = serializer.serialize_struct("HashRecord", field_count)?;
        state.serialize_field("File", &self.path)?;
        state.serialize_field("Bytes", &self.bytes)?;
        if let Some(mtime) = self.mtime {
            state.serialize_field("MTime", &mtime.to_rfc3339())?;
        }
        for (id, hex) in &self.digests {
            // Field names must be `'static` for serde_derive-free manual impls;
            // `json_field_name` only ever returns string literals.
            match json_field_name(*id) {
                "CRC32" => state.serialize_field("CRC32", hex)?,
                "XxHash64" => state.serialize_field("XxHash64", hex)?,
                "MD4" => state.serialize_field("MD4", hex)?,
                "MD5" => state.serialize_field("MD5", hex)?,
                "SHA1" => state.serialize_field("SHA1", hex)?,
                "SHA256" => state.serialize_field("SHA256", hex)?,
                "SHA512" => state.serialize_field("SHA512", hex)?,
                "Blake2b256" => state.serialize_field("Blake2b256", hex)?,
                "Blake2b512" => state.serialize_field("Blake2b512", hex)?,
                "Blake3" => state.serialize_field("Blake3", hex)?,
                "Sha3224" => state.serialize_field("Sha3224", hex)?,
                "Sha3256" => state.serialize_field("Sha3256", hex)?,
                "Sha3384" => state.serialize_field("Sha3384", hex)?,
                "Sha3512" => state.serialize_field("Sha3512", hex)?,
                "ED2K" => state.serialize_field("ED2K", hex)?,
                _ => unreachable!("json_field_name covers every AlgorithmId"),
            }
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AlgorithmId;

    #[test]
    fn json_omits_absent_digests_and_mtime() {
        let mut record = HashRecord::new("foo.txt".to_string(), 42, None);
        record
            .digests
            .insert(AlgorithmId::Md5, "deadbeef".to_string());
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get("File").unwrap(), "foo.txt");
        assert_eq!(obj.get("Bytes").unwrap(), 42);
        assert!(!obj.contains_key("MTime"));
        assert!(!obj.contains_key("SHA256"));
        assert_eq!(obj.get("MD5").unwrap(), "deadbeef");
    }

    #[test]
    fn json_includes_mtime_when_present() {
        let mtime = chrono::DateTime::from_timestamp(0, 0).unwrap();
        let record = HashRecord::new("foo.txt".to_string(), 0, Some(mtime));
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.as_object().unwrap().contains_key("MTime"));
    }
}
