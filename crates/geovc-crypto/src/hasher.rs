use geovc_types::{Envelope, FieldValue, ObjectId};
use sha1::{Digest, Sha1};

/// Domain-separated SHA-1 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"geovc-tree-v1"`) that is fed into
/// the digest before any content. This prevents cross-type hash collisions: a
/// feature and a tree whose field streams happen to match still produce
/// different ids.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self {
        domain: "geovc-commit-v1",
    };
    /// Hasher for tree objects.
    pub const TREE: Self = Self {
        domain: "geovc-tree-v1",
    };
    /// Hasher for feature objects.
    pub const FEATURE: Self = Self {
        domain: "geovc-feature-v1",
    };
    /// Hasher for feature type objects.
    pub const FEATURE_TYPE: Self = Self {
        domain: "geovc-featuretype-v1",
    };
    /// Hasher for tag objects.
    pub const TAG: Self = Self {
        domain: "geovc-tag-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Start an incremental hash in this hasher's domain.
    pub fn start(&self) -> HashSink {
        let mut sink = HashSink { digest: Sha1::new() };
        sink.digest.update(self.domain.as_bytes());
        sink.digest.update(b":");
        sink
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut sink = self.start();
        sink.put_raw(data);
        sink.finish()
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    /// Raw SHA-1 hash without domain separation (for low-level use).
    pub fn raw_hash(data: &[u8]) -> [u8; 20] {
        let mut out = [0u8; 20];
        out.copy_from_slice(&Sha1::digest(data));
        out
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Incremental funnel that objects write their canonical fields into.
///
/// Variable-length items are length-prefixed so that adjacent fields can never
/// be confused with one another.
pub struct HashSink {
    digest: Sha1,
}

impl HashSink {
    pub fn put_raw(&mut self, data: &[u8]) -> &mut Self {
        self.digest.update(data);
        self
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.digest.update([v]);
        self
    }

    pub fn put_bool(&mut self, v: bool) -> &mut Self {
        self.put_u8(u8::from(v))
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.digest.update(v.to_be_bytes());
        self
    }

    pub fn put_u64(&mut self, v: u64) -> &mut Self {
        self.digest.update(v.to_be_bytes());
        self
    }

    pub fn put_i64(&mut self, v: i64) -> &mut Self {
        self.digest.update(v.to_be_bytes());
        self
    }

    pub fn put_f64(&mut self, v: f64) -> &mut Self {
        self.digest.update(v.to_bits().to_be_bytes());
        self
    }

    pub fn put_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.put_u64(data.len() as u64);
        self.digest.update(data);
        self
    }

    pub fn put_str(&mut self, s: &str) -> &mut Self {
        self.put_bytes(s.as_bytes())
    }

    pub fn put_opt_str(&mut self, s: Option<&str>) -> &mut Self {
        match s {
            Some(s) => self.put_u8(1).put_str(s),
            None => self.put_u8(0),
        }
    }

    pub fn put_id(&mut self, id: &ObjectId) -> &mut Self {
        self.digest.update(id.as_bytes());
        self
    }

    pub fn put_opt_id(&mut self, id: Option<&ObjectId>) -> &mut Self {
        match id {
            Some(id) => self.put_u8(1).put_id(id),
            None => self.put_u8(0),
        }
    }

    pub fn put_envelope(&mut self, env: &Envelope) -> &mut Self {
        self.put_f64(env.min_x)
            .put_f64(env.min_y)
            .put_f64(env.max_x)
            .put_f64(env.max_y)
    }

    pub fn put_opt_envelope(&mut self, env: Option<&Envelope>) -> &mut Self {
        match env {
            Some(env) => self.put_u8(1).put_envelope(env),
            None => self.put_u8(0),
        }
    }

    pub fn put_value(&mut self, value: &FieldValue) -> &mut Self {
        self.put_u8(value.field_type().tag());
        match value {
            FieldValue::Null => self,
            FieldValue::Boolean(v) => self.put_bool(*v),
            FieldValue::Integer(v) => self.put_u32(*v as u32),
            FieldValue::Long(v) => self.put_i64(*v),
            FieldValue::Double(v) => self.put_f64(*v),
            FieldValue::String(v) => self.put_str(v),
            FieldValue::Bytes(v) => self.put_bytes(v),
            FieldValue::Geometry(g) => self.put_bytes(&g.wkb).put_envelope(&g.envelope),
        }
    }

    /// Consume the sink and produce the object id.
    pub fn finish(self) -> ObjectId {
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.digest.finalize());
        ObjectId::from_raw(out)
    }
}
