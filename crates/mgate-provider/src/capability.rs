/// Which request features a provider adapter can express (§6 "capability
/// flag set"). Plain bool fields rather than a bitflags type — the set is
/// small and fixed, and callers read individual flags, never the whole mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub streaming: bool,
    pub tools: bool,
    pub system_messages: bool,
    pub images: bool,
}

impl CapabilitySet {
    pub const fn all() -> Self {
        Self {
            streaming: true,
            tools: true,
            system_messages: true,
            images: true,
        }
    }
}
