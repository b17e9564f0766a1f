use crate::data::PriceRow;

/// Cursor over a sorted, de-duplicated price path.
pub struct PriceClock<'a> {
    rows: &'a [PriceRow],
    cursor: usize,
}

impl<'a> PriceClock<'a> {
    /// `rows` must be sorted by timestamp with no duplicates, as
    /// [`crate::data::load_price_path`] returns them.
    pub fn new(rows: &'a [PriceRow]) -> Option<Self> {
        (!rows.is_empty()).then_some(Self { rows, cursor: 0 })
    }

    pub fn row(&self) -> &'a PriceRow {
        &self.rows[self.cursor]
    }

    pub fn now(&self) -> u64 {
        self.row().timestamp
    }

    /// Move to the next row. Returns false on the last one.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.rows.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Seconds since the previous row, 0 on the first.
    pub fn dt_seconds(&self) -> u64 {
        match self.cursor {
            0 => 0,
            i => self.rows[i].timestamp.saturating_sub(self.rows[i - 1].timestamp),
        }
    }

    pub fn start(&self) -> u64 {
        self.rows[0].timestamp
    }

    pub fn end(&self) -> u64 {
        self.rows[self.rows.len() - 1].timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(timestamp: u64) -> PriceRow {
        PriceRow { timestamp, base_price: 2_000.0, yield_price: 1.0 }
    }

    #[test]
    fn walks_rows_in_order() {
        let rows = [row(10), row(20), row(35)];
        let mut clock = PriceClock::new(&rows).unwrap();
        assert_eq!(clock.len(), 3);
        assert_eq!((clock.now(), clock.dt_seconds()), (10, 0));
        assert!(clock.advance());
        assert!(clock.advance());
        assert_eq!((clock.now(), clock.dt_seconds()), (35, 15));
        assert!(!clock.advance());
        assert_eq!(clock.position(), 2);
        assert_eq!((clock.start(), clock.end()), (10, 35));
    }

    #[test]
    fn empty_path_has_no_clock() {
        assert!(PriceClock::new(&[]).is_none());
    }
}
