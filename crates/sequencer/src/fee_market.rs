//! Base fee tracking. Resolved per the max-only monotonic ratchet: the
//! base fee only ever moves up, never decays, matching the source's
//! `max(currentBaseFee, observed * multiplier)` behavior without the
//! unspecified decay half.

pub struct FeeMarket {
    base_fee: u64,
    multiplier_percent: u64,
}

impl FeeMarket {
    pub fn new(initial_base_fee: u64, multiplier_percent: u64) -> Self {
        Self {
            base_fee: initial_base_fee,
            multiplier_percent,
        }
    }

    pub fn current(&self) -> u64 {
        self.base_fee
    }

    /// Ratchet the base fee up against an observed value, never down.
    pub fn observe(&mut self, observed_base_fee: u64) {
        let scaled = observed_base_fee.saturating_mul(self.multiplier_percent) / 100;
        self.base_fee = self.base_fee.max(scaled);
    }
}
