//! Code-patching backend interface.
//!
//! The manager in this module's parent never touches process memory
//! itself; everything goes through a [`PatchBackend`]. The injected
//! host supplies a MinHook/VirtualProtect implementation, tests supply
//! a recording mock.

use crate::error::Result;

/// Low-level patching operations. Addresses are plain `usize` values in
/// the target process; the backend decides what writing them means.
pub trait PatchBackend {
    /// One-time backend initialization. Called before the first install.
    fn init(&mut self) -> Result<()>;

    /// Detour `target` through `detour`, returning the address of the
    /// trampoline that continues into the original function.
    fn create_trampoline(&mut self, target: usize, detour: usize) -> Result<usize>;

    fn set_trampoline_enabled(&mut self, target: usize, enabled: bool) -> Result<()>;

    fn remove_trampoline(&mut self, target: usize) -> Result<()>;

    /// Overwrite one vtable slot and return the pointer it held.
    fn swap_vtable_slot(&mut self, vtable: usize, index: usize, replacement: usize)
        -> Result<usize>;

    /// Final backend teardown. No installs may follow.
    fn shutdown(&mut self) -> Result<()>;
}
