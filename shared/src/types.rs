use std::fmt;

/// Wrap-safe position stamped on every sync record about one entry.
pub type SyncIndex = u16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Server,
    Client,
}

impl HostType {
    pub fn invert(self) -> Self {
        match self {
            HostType::Server => HostType::Client,
            HostType::Client => HostType::Server,
        }
    }

    pub fn is_authoritative(self) -> bool {
        self == HostType::Server
    }
}

// EntityRef
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct EntityRef(u64);

impl EntityRef {
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// The input slot that triggered an interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InteractionType {
    Primary,
    Secondary,
    Ability1,
    Ability2,
    Ability3,
    Use,
    Pick,
    Pickup,
    Held,
    HeldOffhand,
    Equipped,
    SwapTo,
    SwapFrom,
    Wielding,
    Death,
    Collision,
}

/// Index of a root-level chain inside one manager.
///
/// Client-started chains are positive, server-started chains negative, so
/// both peers allocate without coordinating. Zero is never handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(i32);

impl ChainId {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i32 {
        self.0
    }

    /// Which peer allocated this id.
    pub fn owner(&self) -> HostType {
        if self.0 < 0 {
            HostType::Server
        } else {
            HostType::Client
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
