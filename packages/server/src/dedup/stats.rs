/// Point-in-time storage accounting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    /// Sum of declared sizes over all records.
    pub total_logical_size: u64,
    /// Sum over distinct fingerprints of the largest declared size.
    pub total_unique_size: u64,
    pub saved_size: u64,
    /// `saved_size / total_logical_size * 100`, or 0 when nothing is stored.
    pub savings_percentage: f64,
    pub record_count: u64,
    pub unique_blobs: u64,
}

/// Declared sizes of the records sharing one fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintUsage {
    pub largest: u64,
    pub total: u64,
    pub records: u64,
}

/// Folds per-fingerprint usage into a [`StatsSnapshot`] one group at a time.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    total_logical_size: u64,
    total_unique_size: u64,
    record_count: u64,
    unique_blobs: u64,
}

impl StatsAccumulator {
    pub fn add(&mut self, usage: FingerprintUsage) {
        self.total_logical_size = self.total_logical_size.saturating_add(usage.total);
        self.total_unique_size = self.total_unique_size.saturating_add(usage.largest);
        self.record_count += usage.records;
        self.unique_blobs += 1;
    }

    pub fn finish(self) -> StatsSnapshot {
        let saved_size = self.total_logical_size.saturating_sub(self.total_unique_size);
        let savings_percentage = if self.total_logical_size == 0 {
            0.0
        } else {
            saved_size as f64 / self.total_logical_size as f64 * 100.0
        };

        StatsSnapshot {
            total_logical_size: self.total_logical_size,
            total_unique_size: self.total_unique_size,
            saved_size,
            savings_percentage,
            record_count: self.record_count,
            unique_blobs: self.unique_blobs,
        }
    }
}

pub fn compute_stats<I>(groups: I) -> StatsSnapshot
where
    I: IntoIterator<Item = FingerprintUsage>,
{
    let mut acc = StatsAccumulator::default();
    for usage in groups {
        acc.add(usage);
    }
    acc.finish()
}
