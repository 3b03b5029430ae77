//! Symbolic offset resolution.
//!
//! Maps names like `"CameraUpdate"` to absolute addresses inside the
//! game module. Scanned results are preferred because they survive game
//! patches; the hardcoded table is a per-build fallback, stored relative
//! to the module base since the module is not guaranteed to load at the
//! same address every run.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::signature::Signature;

pub struct OffsetResolver {
    signatures: HashMap<String, Signature>,
    hardcoded: HashMap<String, i64>,
    scanned: HashMap<String, u64>,
    module_base: u64,
    scan_done: bool,
}

impl OffsetResolver {
    pub fn new(module_base: u64) -> Self {
        Self {
            signatures: HashMap::new(),
            hardcoded: HashMap::new(),
            scanned: HashMap::new(),
            module_base,
            scan_done: false,
        }
    }

    /// Register a signature for scanning. Last registration per name wins.
    pub fn register_signature(&mut self, name: impl Into<String>, signature: Signature) {
        self.signatures.insert(name.into(), signature);
    }

    /// Register a module-relative fallback offset.
    pub fn register_hardcoded(&mut self, name: impl Into<String>, relative: i64) {
        self.hardcoded.insert(name.into(), relative);
    }

    /// Run every registered signature over the module image once.
    ///
    /// `region` must start at the module base. A signature that does not
    /// match accumulates a warning and leaves that name to the hardcoded
    /// fallback; scanning never aborts the remaining lookups.
    pub fn scan(&mut self, region: &[u8]) {
        debug!(
            "Scanning {} signatures over {} bytes",
            self.signatures.len(),
            region.len()
        );

        let mut missing = 0usize;
        for (name, sig) in &self.signatures {
            match sig.find(region) {
                Some(offset) => {
                    let address = sig.resolve_reference(region, self.module_base, offset);
                    debug!("  {name}: match at +{offset:#x}, resolved {address:#x}");
                    self.scanned.insert(name.clone(), address);
                }
                None => {
                    warn!("{}", Error::PatternNotFound(name.clone()));
                    missing += 1;
                }
            }
        }

        if missing > 0 {
            warn!(
                "{missing} of {} signatures had no match, falling back to hardcoded offsets",
                self.signatures.len()
            );
        }
        self.scan_done = true;
    }

    /// Resolve a name to an absolute address.
    ///
    /// Prefers a non-zero scanned result, then `hardcoded + module_base`.
    /// A name in neither table is an [`Error::UnresolvedSymbol`]; the
    /// caller must treat that as fatal for whatever hook needed it.
    pub fn resolve(&self, name: &str) -> Result<u64> {
        if self.scan_done
            && let Some(&address) = self.scanned.get(name)
            && address != 0
        {
            return Ok(address);
        }

        if let Some(&relative) = self.hardcoded.get(name) {
            return Ok(self.module_base.wrapping_add_signed(relative));
        }

        Err(Error::UnresolvedSymbol(name.to_string()))
    }
}
