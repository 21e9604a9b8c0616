//! `tilestore` version information.

/// The `tilestore` major version.
#[must_use]
pub fn version_major() -> u32 {
    env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0)
}

/// The `tilestore` minor version.
#[must_use]
pub fn version_minor() -> u32 {
    env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0)
}

/// The `tilestore` patch version.
#[must_use]
pub fn version_patch() -> u32 {
    env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0)
}

/// The `tilestore` version as a `(major, minor, patch)` triple.
#[must_use]
pub fn version() -> (u32, u32, u32) {
    (version_major(), version_minor(), version_patch())
}
