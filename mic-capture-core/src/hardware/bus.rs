use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ownership token for one physical peripheral unit (e.g. `I2S0`).
///
/// Every driver instance that talks to the same unit shares one bus; only
/// one acquisition engine can hold its claim at a time.
pub struct PeripheralBus {
    name: &'static str,
    claimed: AtomicBool,
}

impl PeripheralBus {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            claimed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Claim the unit, or `None` if someone else holds it.
    pub fn try_claim(self: &Arc<Self>) -> Option<PeripheralClaim> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PeripheralClaim {
                bus: Arc::clone(self),
            })
    }
}

impl fmt::Debug for PeripheralBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralBus")
            .field("name", &self.name)
            .field("claimed", &self.is_claimed())
            .finish()
    }
}

/// Held while an engine owns the unit; released on drop.
#[derive(Debug)]
pub struct PeripheralClaim {
    bus: Arc<PeripheralBus>,
}

impl PeripheralClaim {
    pub fn bus_name(&self) -> &'static str {
        self.bus.name
    }
}

impl Drop for PeripheralClaim {
    fn drop(&mut self) {
        self.bus.claimed.store(false, Ordering::Release);
    }
}
