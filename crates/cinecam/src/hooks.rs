//! MinHook/VirtualProtect patch backend and the concrete detours.
//!
//! The detours run on game threads and cannot carry Rust context, so
//! everything they need lives in one process-wide [`DetourContext`].
//! All bookkeeping stays in the core hook manager; this module only
//! supplies the mechanism.

use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cinecam_core::{Error, PatchBackend, Result};
use minhook_sys::{
    MH_CreateHook, MH_DisableHook, MH_EnableHook, MH_Initialize, MH_OK, MH_RemoveHook,
    MH_Uninitialize,
};
use once_cell::sync::OnceCell;
use windows::Win32::System::Memory::{PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS, VirtualProtect};

use crate::shared::{SharedCameraState, TransformRows};

/// Offsets of the view matrices the engine reads back after its camera
/// update, relative to the camera rig passed to the hooked function.
const VIEW_MATRIX_PRIMARY: usize = 0x4D0;
const VIEW_MATRIX_SECONDARY: usize = 0x510;

/// `IDXGISwapChain::Present` slot index.
pub const PRESENT_SLOT: usize = 8;

fn check(status: i32, op: &str) -> Result<()> {
    if status == MH_OK {
        Ok(())
    } else {
        Err(Error::Patch(format!("{op} returned MH_STATUS {status:#x}")))
    }
}

pub struct MinHookBackend;

impl PatchBackend for MinHookBackend {
    fn init(&mut self) -> Result<()> {
        // SAFETY: MH_Initialize has no preconditions; double-init is an
        // error status, not UB.
        check(unsafe { MH_Initialize() }, "MH_Initialize")
    }

    fn create_trampoline(&mut self, target: usize, detour: usize) -> Result<usize> {
        let mut original = std::ptr::null_mut::<c_void>();
        // SAFETY: target is a resolved code address inside the game
        // module; MinHook validates that it is patchable.
        let status =
            unsafe { MH_CreateHook(target as *mut c_void, detour as *mut c_void, &mut original) };
        check(status, "MH_CreateHook")?;
        Ok(original as usize)
    }

    fn set_trampoline_enabled(&mut self, target: usize, enabled: bool) -> Result<()> {
        // SAFETY: target was previously passed to MH_CreateHook.
        let status = unsafe {
            if enabled {
                MH_EnableHook(target as *mut c_void)
            } else {
                MH_DisableHook(target as *mut c_void)
            }
        };
        check(status, if enabled { "MH_EnableHook" } else { "MH_DisableHook" })
    }

    fn remove_trampoline(&mut self, target: usize) -> Result<()> {
        // SAFETY: target was previously passed to MH_CreateHook.
        check(unsafe { MH_RemoveHook(target as *mut c_void) }, "MH_RemoveHook")
    }

    fn swap_vtable_slot(&mut self, vtable: usize, index: usize, replacement: usize) -> Result<usize> {
        let slot = (vtable as *mut usize).wrapping_add(index);
        let mut old = PAGE_PROTECTION_FLAGS(0);

        // SAFETY: slot points into a live vtable; the write is made
        // possible by the protection change and undone right after.
        unsafe {
            VirtualProtect(
                slot as *const c_void,
                std::mem::size_of::<usize>(),
                PAGE_EXECUTE_READWRITE,
                &mut old,
            )
            .map_err(|e| Error::Patch(format!("VirtualProtect: {e}")))?;

            let previous = slot.read();
            slot.write(replacement);

            let mut restored = PAGE_PROTECTION_FLAGS(0);
            VirtualProtect(
                slot as *const c_void,
                std::mem::size_of::<usize>(),
                old,
                &mut restored,
            )
            .map_err(|e| Error::Patch(format!("VirtualProtect restore: {e}")))?;

            Ok(previous)
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        // SAFETY: called after every hook has been removed.
        check(unsafe { MH_Uninitialize() }, "MH_Uninitialize")
    }
}

/// Everything the detours need, reachable from plain function pointers.
pub struct DetourContext {
    shared: Arc<SharedCameraState>,
    camera_original: AtomicUsize,
    present_original: AtomicUsize,
}

static DETOURS: OnceCell<DetourContext> = OnceCell::new();

impl DetourContext {
    pub fn set_camera_original(&self, address: usize) {
        self.camera_original.store(address, Ordering::Release);
    }

    pub fn set_present_original(&self, address: usize) {
        self.present_original.store(address, Ordering::Release);
    }
}

/// Publish the context the detours read. Idempotent; the first call wins.
pub fn install_detour_context(shared: Arc<SharedCameraState>) -> &'static DetourContext {
    DETOURS.get_or_init(|| DetourContext {
        shared,
        camera_original: AtomicUsize::new(0),
        present_original: AtomicUsize::new(0),
    })
}

type CameraUpdateFn = unsafe extern "system" fn(*mut u8, f32, f32) -> i64;
type PresentFn = unsafe extern "system" fn(*mut c_void, u32, u32) -> i32;

/// Detour for the engine's per-frame camera update.
///
/// Enabled: the game's update is skipped entirely and our transform is
/// written into the rig's view matrices. Disabled: the game transform
/// is captured for reset seeding, then the original runs untouched.
pub unsafe extern "system" fn camera_update_detour(rig: *mut u8, dt: f32, blend: f32) -> i64 {
    let Some(ctx) = DETOURS.get() else {
        return 0;
    };

    if ctx.shared.is_enabled() {
        let rows = ctx.shared.read_override();
        // SAFETY: rig is the engine camera rig this function is always
        // called with; the matrix offsets are per-title constants.
        unsafe {
            (rig.add(VIEW_MATRIX_PRIMARY) as *mut TransformRows).write_unaligned(rows);
            (rig.add(VIEW_MATRIX_SECONDARY) as *mut TransformRows).write_unaligned(rows);
        }
        return 0;
    }

    // SAFETY: the rig starts with the game camera's world transform.
    let game_rows = unsafe { (rig as *const TransformRows).read_unaligned() };
    ctx.shared.capture(&game_rows);

    let original = ctx.camera_original.load(Ordering::Acquire);
    if original == 0 {
        return 0;
    }
    // SAFETY: original is the trampoline MinHook returned for this
    // exact signature.
    unsafe {
        let original: CameraUpdateFn = std::mem::transmute(original);
        original(rig, dt, blend)
    }
}

/// Detour for `IDXGISwapChain::Present`; the overlay renderer attaches
/// here once one exists.
pub unsafe extern "system" fn present_detour(
    swapchain: *mut c_void,
    sync_interval: u32,
    flags: u32,
) -> i32 {
    let original = DETOURS
        .get()
        .map(|ctx| ctx.present_original.load(Ordering::Acquire))
        .unwrap_or(0);
    if original == 0 {
        return 0;
    }
    // SAFETY: original is the vtable entry this detour replaced.
    unsafe {
        let original: PresentFn = std::mem::transmute(original);
        original(swapchain, sync_interval, flags)
    }
}
