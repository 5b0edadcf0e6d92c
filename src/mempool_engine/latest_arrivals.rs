use super::StrippedTransaction;

/// Rolling list of the most recently observed arrivals, newest first.
pub struct LatestArrivals {
    capacity: usize,
    items: Vec<StrippedTransaction>,
}

impl LatestArrivals {
    pub fn new(capacity: usize) -> LatestArrivals {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Prepends the pass's new arrivals and truncates to capacity.
    pub fn push(&mut self, mut arrivals: Vec<StrippedTransaction>) {
        arrivals.append(&mut self.items);
        arrivals.truncate(self.capacity);
        self.items = arrivals;
    }

    pub fn list(&self) -> Vec<StrippedTransaction> {
        self.items.clone()
    }
}
