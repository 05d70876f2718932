use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Network reachability signal supplied by the embedding environment.
///
/// The orchestrator checks it once per fetch, before touching any provider.
pub trait NetworkReachability: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Reachability port for environments without an offline signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl NetworkReachability for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Shared, switchable reachability flag.
#[derive(Debug, Clone)]
pub struct ReachabilityFlag {
    online: Arc<AtomicBool>,
}

impl ReachabilityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

impl Default for ReachabilityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkReachability for ReachabilityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}
