/// Maps the logical rows of a viewport onto a fixed set of physical row slots.
///
/// `top` and `bottom` are unwrapped counters; the slot backing a counter value
/// is its remainder modulo the row count. Scrolling moves both counters by the
/// same amount, so `bottom - top` always equals the row count and a slot is
/// only ever reassigned, never copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRing {
    rows: usize,
    top: i64,
    bottom: i64,
}

impl RowRing {
    /// Creates a ring over `rows` slots with row 0 in slot 0.
    pub fn new(rows: usize) -> Self {
        Self { rows, top: 0, bottom: rows as i64 }
    }

    /// Number of slots, which is also the number of visible rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Physical slot of the first visible row.
    pub fn top(&self) -> usize {
        self.wrap(self.top)
    }

    /// Physical slot one past the last visible row, which is also [`top`](Self::top).
    pub fn bottom(&self) -> usize {
        self.wrap(self.bottom)
    }

    /// Physical slot showing logical row `row`, counted from the top.
    pub fn slot(&self, row: usize) -> usize {
        self.wrap(self.top + row as i64)
    }

    /// Scrolls down one row. The old top slot becomes the new bottom row,
    /// and is returned for the caller to refill.
    pub fn advance(&mut self) -> usize {
        let recycled = self.top();
        self.top += 1;
        self.bottom += 1;
        recycled
    }

    /// Scrolls up one row. The old bottom slot becomes the new top row,
    /// and is returned for the caller to refill.
    pub fn retreat(&mut self) -> usize {
        self.top -= 1;
        self.bottom -= 1;
        self.top()
    }

    /// Puts logical row 0 back into slot 0.
    pub fn reset(&mut self) {
        *self = Self::new(self.rows);
    }

    fn wrap(&self, counter: i64) -> usize {
        if self.rows == 0 { 0 } else { counter.rem_euclid(self.rows as i64) as usize }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(ring: &RowRing) -> Vec<usize> {
        (0..ring.rows()).map(|row| ring.slot(row)).collect()
    }

    #[test]
    fn starts_identity_mapped() {
        let ring = RowRing::new(3);
        assert_eq!(slots(&ring), vec![0, 1, 2]);
        assert_eq!(ring.top(), ring.bottom());
    }

    #[test]
    fn advance_recycles_the_top_slot() {
        let mut ring = RowRing::new(3);

        assert_eq!(ring.advance(), 0);
        assert_eq!(slots(&ring), vec![1, 2, 0]);
        assert_eq!(ring.advance(), 1);
        assert_eq!(slots(&ring), vec![2, 0, 1]);
    }

    #[test]
    fn retreat_recycles_the_bottom_slot() {
        let mut ring = RowRing::new(3);

        assert_eq!(ring.retreat(), 2);
        assert_eq!(slots(&ring), vec![2, 0, 1]);
        assert_eq!(ring.retreat(), 1);
        assert_eq!(slots(&ring), vec![1, 2, 0]);
    }

    #[test]
    fn advance_then_retreat_restores_mapping() {
        let mut ring = RowRing::new(5);
        let before = ring;

        for _ in 0..7 {
            ring.advance();
        }
        for _ in 0..7 {
            ring.retreat();
        }

        assert_eq!(ring, before);
    }

    #[test]
    fn visible_rows_stay_a_permutation() {
        let mut ring = RowRing::new(4);
        for step in 0..20 {
            if step % 3 == 0 { ring.retreat() } else { ring.advance() };

            let mut seen = slots(&ring);
            seen.sort_unstable();
            assert_eq!(seen, vec![0, 1, 2, 3]);
            assert_eq!(ring.top(), ring.bottom());
        }
    }
}
