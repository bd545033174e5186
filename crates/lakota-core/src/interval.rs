//! Inclusive key intervals and their algebra.
//!
//! Revisions claim `[start, stop]` ranges over the primary key, and later
//! claims hide earlier ones by interval subtraction — the workhorse of both
//! `read` and `merge`. Writes always produce both-closed intervals; open
//! bounds appear only as subtraction residue, recorded in the [`Closed`]
//! flag.
//!
//! Endpoints may be partial keys (a read range can name fewer columns than
//! the primary key); comparisons then cover the shared prefix only, so an
//! inclusive partial endpoint reaches every full key sharing its prefix.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};
use crate::value::Key;

/// Which endpoints an interval includes. Bit 1 = right, bit 2 = left,
/// matching the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    Neither,
    Right,
    Left,
    Both,
}

impl Closed {
    pub fn from_bounds(left: bool, right: bool) -> Self {
        match (left, right) {
            (true, true) => Closed::Both,
            (true, false) => Closed::Left,
            (false, true) => Closed::Right,
            (false, false) => Closed::Neither,
        }
    }

    pub fn left(&self) -> bool {
        matches!(self, Closed::Left | Closed::Both)
    }

    pub fn right(&self) -> bool {
        matches!(self, Closed::Right | Closed::Both)
    }

    pub fn code(&self) -> u8 {
        match self {
            Closed::Neither => 0,
            Closed::Right => 1,
            Closed::Left => 2,
            Closed::Both => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Closed::Neither),
            1 => Ok(Closed::Right),
            2 => Ok(Closed::Left),
            3 => Ok(Closed::Both),
            other => Err(Error::InvalidSchema(format!(
                "unknown closed flag {other}"
            ))),
        }
    }
}

/// A key range with per-endpoint closedness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub start: Key,
    pub stop: Key,
    pub closed: Closed,
}

/// Order two start bounds; `Less` starts earlier. On an equal prefix a
/// closed bound starts before an open one, and a shorter key before a
/// longer one (it already covers every extension of the prefix).
fn cmp_start(a: &Key, a_closed: bool, b: &Key, b_closed: bool) -> Ordering {
    match a.cmp_prefix(b) {
        Ordering::Equal => match (a_closed, b_closed) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.len().cmp(&b.len()),
        },
        ord => ord,
    }
}

/// Order two stop bounds; `Greater` stops later. On an equal prefix a
/// closed bound outlasts an open one, and a shorter key a longer one.
fn cmp_stop(a: &Key, a_closed: bool, b: &Key, b_closed: bool) -> Ordering {
    match a.cmp_prefix(b) {
        Ordering::Equal => match (a_closed, b_closed) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => b.len().cmp(&a.len()),
        },
        ord => ord,
    }
}

impl Interval {
    /// The usual write-time interval: both endpoints included.
    pub fn closed(start: Key, stop: Key) -> Self {
        Interval {
            start,
            stop,
            closed: Closed::Both,
        }
    }

    pub fn new(start: Key, stop: Key, closed: Closed) -> Self {
        Interval {
            start,
            stop,
            closed,
        }
    }

    /// No key can fall inside an inverted range, or on a point that both
    /// endpoints exclude.
    pub fn is_empty(&self) -> bool {
        match self.start.cmp_prefix(&self.stop) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.closed.left() && self.closed.right()),
            Ordering::Less => false,
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        let after_start = match key.cmp_prefix(&self.start) {
            Ordering::Greater => true,
            Ordering::Equal => self.closed.left(),
            Ordering::Less => false,
        };
        let before_stop = match key.cmp_prefix(&self.stop) {
            Ordering::Less => true,
            Ordering::Equal => self.closed.right(),
            Ordering::Greater => false,
        };
        after_start && before_stop
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.intersect(other).is_some()
    }

    /// The shared range, or `None` when disjoint.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let (start, left) = if cmp_start(
            &self.start,
            self.closed.left(),
            &other.start,
            other.closed.left(),
        ) == Ordering::Less
        {
            (other.start.clone(), other.closed.left())
        } else {
            (self.start.clone(), self.closed.left())
        };
        let (stop, right) = if cmp_stop(
            &self.stop,
            self.closed.right(),
            &other.stop,
            other.closed.right(),
        ) == Ordering::Greater
        {
            (other.stop.clone(), other.closed.right())
        } else {
            (self.stop.clone(), self.closed.right())
        };
        let out = Interval::new(start, stop, Closed::from_bounds(left, right));
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// `self \ other`: whatever of `self` is not covered by `other`,
    /// as zero, one or two intervals.
    pub fn subtract(&self, other: &Interval) -> Vec<Interval> {
        if self.is_empty() {
            return Vec::new();
        }
        if self.intersect(other).is_none() {
            return vec![self.clone()];
        }

        let mut pieces = Vec::new();

        // Piece before `other` begins.
        if cmp_start(
            &self.start,
            self.closed.left(),
            &other.start,
            other.closed.left(),
        ) == Ordering::Less
        {
            let piece = Interval::new(
                self.start.clone(),
                other.start.clone(),
                Closed::from_bounds(self.closed.left(), !other.closed.left()),
            );
            if !piece.is_empty() {
                pieces.push(piece);
            }
        }

        // Piece after `other` ends.
        if cmp_stop(
            &self.stop,
            self.closed.right(),
            &other.stop,
            other.closed.right(),
        ) == Ordering::Greater
        {
            let piece = Interval::new(
                other.stop.clone(),
                self.stop.clone(),
                Closed::from_bounds(!other.closed.right(), self.closed.right()),
            );
            if !piece.is_empty() {
                pieces.push(piece);
            }
        }

        pieces
    }

    /// Restrict to a user read range. Both bounds are inclusive and either
    /// may be absent (open-ended). Returns `None` when nothing is left.
    pub fn clamp(&self, lo: Option<&Key>, hi: Option<&Key>) -> Option<Interval> {
        let mut out = self.clone();
        if let Some(lo) = lo {
            if cmp_start(&out.start, out.closed.left(), lo, true) == Ordering::Less {
                out.closed = Closed::from_bounds(true, out.closed.right());
                out.start = lo.clone();
            }
        }
        if let Some(hi) = hi {
            if cmp_stop(&out.stop, out.closed.right(), hi, true) == Ordering::Greater {
                out.closed = Closed::from_bounds(out.closed.left(), true);
                out.stop = hi.clone();
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.closed.left() { '[' } else { '(' };
        let close = if self.closed.right() { ']' } else { ')' };
        write!(f, "{}{} -> {}{}", open, self.start, self.stop, close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn iv(start: i64, stop: i64) -> Interval {
        Interval::closed(Key::single(start), Key::single(stop))
    }

    #[test]
    fn test_contains_inclusive_bounds() {
        let i = iv(2, 5);
        assert!(i.contains(&Key::single(2i64)));
        assert!(i.contains(&Key::single(5i64)));
        assert!(!i.contains(&Key::single(1i64)));
        assert!(!i.contains(&Key::single(6i64)));
    }

    #[test]
    fn test_open_bounds_exclude_endpoints() {
        let i = Interval::new(Key::single(2i64), Key::single(5i64), Closed::Neither);
        assert!(!i.contains(&Key::single(2i64)));
        assert!(!i.contains(&Key::single(5i64)));
        assert!(i.contains(&Key::single(3i64)));
    }

    #[test]
    fn test_is_empty() {
        assert!(iv(5, 2).is_empty());
        assert!(!iv(2, 2).is_empty());
        assert!(Interval::new(Key::single(2i64), Key::single(2i64), Closed::Left).is_empty());
    }

    #[test]
    fn test_intersect_overlap() {
        let got = iv(1, 5).intersect(&iv(3, 9)).unwrap();
        assert_eq!(got, iv(3, 5));
    }

    #[test]
    fn test_intersect_disjoint() {
        assert!(iv(1, 2).intersect(&iv(3, 4)).is_none());
    }

    #[test]
    fn test_intersect_touching_endpoints() {
        // [1,3] ∩ [3,5] = the single key 3
        let got = iv(1, 3).intersect(&iv(3, 5)).unwrap();
        assert_eq!(got, iv(3, 3));
    }

    #[test]
    fn test_subtract_no_overlap() {
        assert_eq!(iv(1, 2).subtract(&iv(5, 9)), vec![iv(1, 2)]);
    }

    #[test]
    fn test_subtract_full_cover() {
        assert!(iv(3, 4).subtract(&iv(1, 9)).is_empty());
    }

    #[test]
    fn test_subtract_middle_split() {
        let pieces = iv(1, 9).subtract(&iv(4, 6));
        assert_eq!(pieces.len(), 2);
        // Left piece keeps 1..4 with 4 excluded.
        assert_eq!(pieces[0].closed, Closed::Left);
        assert!(pieces[0].contains(&Key::single(3i64)));
        assert!(!pieces[0].contains(&Key::single(4i64)));
        // Right piece keeps 6..9 with 6 excluded.
        assert_eq!(pieces[1].closed, Closed::Right);
        assert!(!pieces[1].contains(&Key::single(6i64)));
        assert!(pieces[1].contains(&Key::single(7i64)));
        assert!(pieces[1].contains(&Key::single(9i64)));
    }

    #[test]
    fn test_subtract_left_overlap() {
        // [1,5] \ [3,9] keeps [1,3)
        let pieces = iv(1, 5).subtract(&iv(3, 9));
        assert_eq!(pieces.len(), 1);
        assert!(pieces[0].contains(&Key::single(1i64)));
        assert!(pieces[0].contains(&Key::single(2i64)));
        assert!(!pieces[0].contains(&Key::single(3i64)));
    }

    #[test]
    fn test_subtract_right_overlap() {
        // [3,9] \ [1,5] keeps (5,9]
        let pieces = iv(3, 9).subtract(&iv(1, 5));
        assert_eq!(pieces.len(), 1);
        assert!(!pieces[0].contains(&Key::single(5i64)));
        assert!(pieces[0].contains(&Key::single(6i64)));
    }

    #[test]
    fn test_partial_stop_covers_prefix() {
        // stop = (5,) inclusive reaches the full key (5, "x")
        let i = Interval::closed(Key::single(1i64), Key::single(5i64));
        let full = Key::new(vec![Value::Int(5), Value::Str("x".into())]);
        assert!(i.contains(&full));
    }

    #[test]
    fn test_clamp_both_bounds() {
        let got = iv(1, 9)
            .clamp(Some(&Key::single(3i64)), Some(&Key::single(5i64)))
            .unwrap();
        assert_eq!(got, iv(3, 5));
    }

    #[test]
    fn test_clamp_open_ended() {
        assert_eq!(iv(1, 9).clamp(None, None), Some(iv(1, 9)));
        let upper = iv(1, 9).clamp(None, Some(&Key::single(4i64))).unwrap();
        assert_eq!(upper, iv(1, 4));
        let lower = iv(1, 9).clamp(Some(&Key::single(4i64)), None).unwrap();
        assert_eq!(lower, iv(4, 9));
    }

    #[test]
    fn test_clamp_to_nothing() {
        assert!(iv(1, 3).clamp(Some(&Key::single(7i64)), None).is_none());
    }

    #[test]
    fn test_closed_codes() {
        for c in [Closed::Neither, Closed::Right, Closed::Left, Closed::Both] {
            assert_eq!(Closed::from_code(c.code()).unwrap(), c);
        }
        assert!(Closed::from_code(4).is_err());
    }
}
