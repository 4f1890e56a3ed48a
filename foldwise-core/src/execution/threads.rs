//! Thread-count policy.

/// Maps a requested worker count to the number of threads actually used.
pub trait ThreadCountResolver: Send + Sync {
    fn resolve(&self, requested: i32) -> usize;
}

/// Resolves negative requests to the host's available parallelism.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostThreadResolver;

impl ThreadCountResolver for HostThreadResolver {
    fn resolve(&self, requested: i32) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        determine_num_threads(requested, available)
    }
}

/// `0`/`1` → sequential, `n > 1` → `n`, negative → `available`.
pub fn determine_num_threads(requested: i32, available: usize) -> usize {
    match requested {
        r if r < 0 => available.max(1),
        0 | 1 => 1,
        r => r as usize,
    }
}
