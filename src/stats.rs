use serde::{Deserialize, Serialize};

/// Statistics collected by one pass of the read loop
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub bytes_read: u64,
    pub reads: u64,
    pub records: u64,
    pub links: u64,
    /// Reloads that carried an incomplete token into the next read
    pub resumes: u64,
    /// Longest tail carried across a reload
    pub max_carried: u64,
}

impl BuildStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_read(&mut self, bytes: u64) {
        self.reads += 1;
        self.bytes_read += bytes;
    }

    pub fn add_links(&mut self, count: u64) {
        self.links += count;
    }

    pub fn record_carry(&mut self, bytes: u64) {
        self.resumes += 1;
        self.max_carried = self.max_carried.max(bytes);
    }

    /// Average bytes per read call
    pub fn mean_read(&self) -> f64 {
        if self.reads == 0 {
            0.0
        } else {
            self.bytes_read as f64 / self.reads as f64
        }
    }
}
