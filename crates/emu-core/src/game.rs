//! Game metadata and database lookup.

use crate::services::DisplayType;

/// Metadata for a loaded ROM, typically resolved from a game database by
/// content hash before the machine is constructed.
#[derive(Debug, Clone, Default)]
pub struct GameInfo {
    pub name: String,
    /// Content hash in `SHA1:...` form, as supplied by the database
    /// layer. The core never hashes ROMs itself.
    pub hash: String,
    /// Mapper code override ("F8", "SB", ...). `None` means the machine
    /// detects one from the ROM image.
    pub mapper_code: Option<String>,
    pub region: DisplayType,
}

/// Content-hash to metadata lookup, implemented by the database layer
/// outside the core.
pub trait GameDb {
    fn lookup(&self, hash: &str) -> Option<GameInfo>;
}
