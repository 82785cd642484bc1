//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

/// A 2D bounding box attached to tree entries and buckets.
///
/// An envelope with `min_x > max_x` is empty. [`Envelope::empty`] produces the
/// canonical empty envelope, which is the identity for [`Envelope::expand`].
///
/// Equality compares the bit patterns of the coordinates, the same bytes
/// that go into content hashes, so `-0.0` and `0.0` differ and a NaN equals
/// itself.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope from its corners, normalizing the order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// A degenerate envelope covering a single point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// The empty envelope.
    pub const fn empty() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: -1.0,
            max_y: -1.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    /// Grow this envelope to also cover `other`.
    pub fn expand(&mut self, other: &Envelope) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, other: &Envelope) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Union of an iterator of optional envelopes; `None` if nothing is bounded.
    pub fn union_of<'a, I>(items: I) -> Option<Envelope>
    where
        I: IntoIterator<Item = Option<&'a Envelope>>,
    {
        let mut acc = Envelope::empty();
        for env in items.into_iter().flatten() {
            acc.expand(env);
        }
        (!acc.is_empty()).then_some(acc)
    }
}

impl Envelope {
    fn bits(&self) -> [u64; 4] {
        [
            self.min_x.to_bits(),
            self.min_y.to_bits(),
            self.max_x.to_bits(),
            self.max_y.to_bits(),
        ]
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Envelope {}

impl Default for Envelope {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_corners() {
        let env = Envelope::new(10.0, 5.0, -1.0, 2.0);
        assert_eq!(env.min_x, -1.0);
        assert_eq!(env.max_x, 10.0);
        assert_eq!(env.min_y, 2.0);
        assert_eq!(env.max_y, 5.0);
    }

    #[test]
    fn empty_is_identity_for_expand() {
        let mut env = Envelope::empty();
        assert!(env.is_empty());
        env.expand(&Envelope::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(env, Envelope::new(0.0, 0.0, 1.0, 1.0));
        env.expand(&Envelope::empty());
        assert_eq!(env, Envelope::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn expand_covers_both() {
        let mut env = Envelope::point(0.0, 0.0);
        env.expand(&Envelope::point(3.0, -2.0));
        assert_eq!(env, Envelope::new(0.0, -2.0, 3.0, 0.0));
        assert_eq!(env.width(), 3.0);
        assert_eq!(env.height(), 2.0);
    }

    #[test]
    fn intersects_and_contains() {
        let a = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let b = Envelope::new(5.0, 5.0, 15.0, 15.0);
        let c = Envelope::new(20.0, 20.0, 30.0, 30.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.contains(&Envelope::point(1.0, 1.0)));
        assert!(!a.contains(&b));
        assert!(!Envelope::empty().intersects(&a));
    }

    #[test]
    fn equality_follows_bit_patterns() {
        assert_ne!(Envelope::point(-0.0, 0.0), Envelope::point(0.0, 0.0));
        assert_eq!(Envelope::point(-0.0, 1.0), Envelope::point(-0.0, 1.0));
        let nan = Envelope::point(f64::NAN, 0.0);
        assert_eq!(nan, nan);
    }

    #[test]
    fn union_of_skips_unbounded() {
        let a = Envelope::point(1.0, 1.0);
        let b = Envelope::point(4.0, 2.0);
        let u = Envelope::union_of([Some(&a), None, Some(&b)]).unwrap();
        assert_eq!(u, Envelope::new(1.0, 1.0, 4.0, 2.0));
        assert!(Envelope::union_of([None, None]).is_none());
    }
}
