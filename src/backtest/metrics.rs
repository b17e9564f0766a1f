/// Tracks share price over a backtest: return and drawdown.
pub struct SharePriceMetrics {
    initial: f64,
    peak: f64,
    max_drawdown: f64,
    last: f64,
    samples: usize,
}

impl SharePriceMetrics {
    pub fn new(initial_share_price: f64) -> Self {
        Self {
            initial: initial_share_price,
            peak: initial_share_price,
            max_drawdown: 0.0,
            last: initial_share_price,
            samples: 0,
        }
    }

    /// Record end-of-tick share price: updates peak and drawdown.
    pub fn record_tick(&mut self, share_price: f64) {
        if share_price > self.peak {
            self.peak = share_price;
        }
        let drawdown = if self.peak > 0.0 {
            (self.peak - share_price) / self.peak
        } else {
            0.0
        };
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
        self.last = share_price;
        self.samples += 1;
    }

    /// Share price change over the run, in percent.
    pub fn return_pct(&self) -> f64 {
        if self.initial > 0.0 {
            (self.last / self.initial - 1.0) * 100.0
        } else {
            0.0
        }
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown * 100.0
    }

    pub fn final_share_price(&self) -> f64 {
        self.last
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_drawdown_from_peak() {
        let mut m = SharePriceMetrics::new(1.0);
        m.record_tick(1.1);
        m.record_tick(0.99);
        m.record_tick(1.05);
        assert!((m.max_drawdown_pct() - 10.0).abs() < 1e-9);
        assert!((m.return_pct() - 5.0).abs() < 1e-9);
        assert_eq!(m.samples(), 3);
    }
}
