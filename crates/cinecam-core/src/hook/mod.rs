//! Hook bookkeeping.
//!
//! Two patching styles are supported: function detours that route
//! through a trampoline, and vtable slot swaps. The manager tracks each
//! installed hook by name, keeps the "other" pointer for vtable hooks
//! so toggling is a symmetric swap, and tears everything down in the
//! safe order (disable, then remove).

pub mod backend;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{Error, Result};

pub use self::backend::PatchBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Detour through a trampoline; `address` is the hooked function.
    Trampoline,
    /// Direct vtable slot overwrite.
    VTableSlot { vtable: usize, index: usize },
}

#[derive(Debug, Clone)]
pub struct Hook {
    kind: HookKind,
    /// Hooked function for trampolines, replacement pointer for vtable
    /// slots.
    address: usize,
    enabled: bool,
    /// Trampoline address for trampoline hooks. For vtable hooks, the
    /// pointer currently *not* in the slot (the original while enabled,
    /// our replacement while disabled).
    original: usize,
}

impl Hook {
    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Continuation pointer a detour calls to reach the original code.
    pub fn original(&self) -> usize {
        self.original
    }
}

pub struct HookManager<B: PatchBackend> {
    backend: B,
    hooks: HashMap<String, Hook>,
}

impl<B: PatchBackend> HookManager<B> {
    pub fn new(mut backend: B) -> Result<Self> {
        backend.init()?;
        Ok(Self {
            backend,
            hooks: HashMap::new(),
        })
    }

    pub fn hook(&self, name: &str) -> Result<&Hook> {
        self.hooks
            .get(name)
            .ok_or_else(|| Error::HookNotFound(name.to_string()))
    }

    /// Trampoline address for a named hook, for calling the original
    /// function from inside its detour.
    pub fn original(&self, name: &str) -> Result<usize> {
        Ok(self.hook(name)?.original)
    }

    /// Install a detour. The hook is deliberately registered disabled:
    /// the caller publishes the trampoline pointer (see
    /// [`Self::original`]) to its detour first, then arms the hook with
    /// [`Self::set_state`]. Arming before the pointer is visible would
    /// let the detour run with nothing to chain to. Vtable hooks have no
    /// such window and install enabled.
    pub fn install_trampoline(&mut self, name: &str, target: usize, detour: usize) -> Result<()> {
        self.check_name_free(name)?;
        let original = self
            .backend
            .create_trampoline(target, detour)
            .map_err(|e| install_error(name, e))?;

        debug!("Installed trampoline hook '{name}' at {target:#x}");
        self.hooks.insert(
            name.to_string(),
            Hook {
                kind: HookKind::Trampoline,
                address: target,
                enabled: false,
                original,
            },
        );
        Ok(())
    }

    /// Install a vtable slot hook. The slot is written immediately, so
    /// the hook starts enabled.
    pub fn install_vtable_slot(
        &mut self,
        name: &str,
        vtable: usize,
        index: usize,
        replacement: usize,
    ) -> Result<()> {
        self.check_name_free(name)?;
        let original = self
            .backend
            .swap_vtable_slot(vtable, index, replacement)
            .map_err(|e| install_error(name, e))?;

        debug!("Installed vtable hook '{name}' at {vtable:#x}[{index}]");
        self.hooks.insert(
            name.to_string(),
            Hook {
                kind: HookKind::VTableSlot { vtable, index },
                address: replacement,
                enabled: true,
                original,
            },
        );
        Ok(())
    }

    /// Enable or disable one hook, or every hook when `name` is `None`.
    /// Asking for the current state warns and changes nothing.
    pub fn set_state(&mut self, enabled: bool, name: Option<&str>) -> Result<()> {
        let names: Vec<String> = match name {
            Some(n) => {
                self.hook(n)?;
                vec![n.to_string()]
            }
            None => self.hooks.keys().cloned().collect(),
        };

        for n in names {
            self.set_one(&n, enabled)?;
        }
        Ok(())
    }

    fn set_one(&mut self, name: &str, enabled: bool) -> Result<()> {
        let hook = self
            .hooks
            .get_mut(name)
            .ok_or_else(|| Error::HookNotFound(name.to_string()))?;
        if hook.enabled == enabled {
            warn!("Hook '{name}' already {}", state_label(enabled));
            return Ok(());
        }

        match hook.kind {
            HookKind::Trampoline => {
                self.backend.set_trampoline_enabled(hook.address, enabled)?;
            }
            HookKind::VTableSlot { vtable, index } => {
                // Symmetric swap: what comes out of the slot is what goes
                // back in on the next toggle.
                hook.original = self.backend.swap_vtable_slot(vtable, index, hook.original)?;
            }
        }
        hook.enabled = enabled;
        debug!("Hook '{name}' {}", state_label(enabled));
        Ok(())
    }

    /// Remove one hook, or every hook when `name` is `None`. Enabled
    /// hooks are disabled before removal.
    pub fn uninstall(&mut self, name: Option<&str>) -> Result<()> {
        let names: Vec<String> = match name {
            Some(n) => {
                self.hook(n)?;
                vec![n.to_string()]
            }
            None => self.hooks.keys().cloned().collect(),
        };

        for n in names {
            if self.hooks[&n].enabled {
                self.set_one(&n, false)?;
            }
            let hook = self
                .hooks
                .remove(&n)
                .ok_or_else(|| Error::HookNotFound(n.clone()))?;
            if hook.kind == HookKind::Trampoline {
                self.backend.remove_trampoline(hook.address)?;
            }
            debug!("Uninstalled hook '{n}'");
        }
        Ok(())
    }

    /// Tear down all hooks and the backend itself.
    pub fn shutdown(&mut self) -> Result<()> {
        self.uninstall(None)?;
        self.backend.shutdown()
    }

    fn check_name_free(&self, name: &str) -> Result<()> {
        if self.hooks.contains_key(name) {
            return Err(Error::HookInstallFailed {
                name: name.to_string(),
                message: "a hook with this name already exists".to_string(),
            });
        }
        Ok(())
    }
}

fn install_error(name: &str, source: Error) -> Error {
    Error::HookInstallFailed {
        name: name.to_string(),
        message: source.to_string(),
    }
}

fn state_label(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}
