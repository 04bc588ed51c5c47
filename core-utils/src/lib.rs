pub mod hex {
    /// Small ToHex trait shared by every crate for debug formatting.
    pub trait ToHex {
        fn to_hex(&self) -> String;
    }

    impl ToHex for Vec<u8> {
        fn to_hex(&self) -> String {
            hex::encode(self)
        }
    }

    impl ToHex for [u8] {
        fn to_hex(&self) -> String {
            hex::encode(self)
        }
    }
}

pub mod mem_size {
    /// Trait to estimate memory usage, used to size staged-view caches.
    pub trait MemSizeEstimator {
        fn estimate_mem_bytes(&self) -> usize {
            std::mem::size_of_val(self)
        }
    }
}

pub use serde_bytes;

pub mod serde_bytes_fixed_ref {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]> + ?Sized,
    {
        serializer.serialize_bytes(value.as_ref())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let bytes: Vec<u8> = serde_bytes::ByteBuf::deserialize(deserializer)?.into_vec();
        T::try_from(bytes).map_err(|_| serde::de::Error::custom("wrong byte length for fixed-size field"))
    }
}
