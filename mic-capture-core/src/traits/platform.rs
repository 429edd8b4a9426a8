use crate::models::variant::HardwareVariant;

/// Platform-identification collaborator, read once during setup.
pub trait PlatformIdentity: Send + Sync {
    fn current_variant(&self) -> HardwareVariant;
}

/// A fixed variant, e.g. baked in at build time.
impl PlatformIdentity for HardwareVariant {
    fn current_variant(&self) -> HardwareVariant {
        *self
    }
}
