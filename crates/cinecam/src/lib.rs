//! # cinecam
//!
//! Injected cinematic camera tool. Loaded into the game with
//! `LoadLibrary`, `DllMain` spawns a worker thread that discovers the
//! process, installs the hooks and runs the tool loop until the DLL is
//! unloaded.
//!
//! All camera, track and hooking logic lives in `cinecam-core`; this
//! crate is the Windows-facing glue.

mod input;
mod process;
mod shared;
mod shutdown;

#[cfg(target_os = "windows")]
mod hooks;
#[cfg(target_os = "windows")]
mod runtime;

#[cfg(target_os = "windows")]
use std::sync::Arc;

#[cfg(target_os = "windows")]
use once_cell::sync::OnceCell;

#[cfg(target_os = "windows")]
use crate::shutdown::ShutdownSignal;

#[cfg(target_os = "windows")]
static SHUTDOWN: OnceCell<Arc<ShutdownSignal>> = OnceCell::new();

#[cfg(target_os = "windows")]
fn shutdown_signal() -> Arc<ShutdownSignal> {
    Arc::clone(SHUTDOWN.get_or_init(|| Arc::new(ShutdownSignal::new())))
}

#[cfg(target_os = "windows")]
fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all("./cinecam")?;
    let file = std::fs::File::create("./cinecam/cinecam.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .with_writer(std::sync::Arc::new(file))
        .init();
    Ok(())
}

#[cfg(target_os = "windows")]
fn worker() {
    // Give the game time to finish bootstrapping before scanning it.
    std::thread::sleep(std::time::Duration::from_millis(500));

    if init_logging().is_err() {
        // No log sink; nothing useful left to do.
        return;
    }
    if let Err(e) = runtime::run(shutdown_signal()) {
        tracing::error!("cinecam failed: {e:#}");
    }
}

#[cfg(target_os = "windows")]
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn DllMain(
    module: windows::Win32::Foundation::HMODULE,
    reason: u32,
    _reserved: *mut std::ffi::c_void,
) -> windows::Win32::Foundation::BOOL {
    use windows::Win32::System::LibraryLoader::DisableThreadLibraryCalls;
    use windows::Win32::System::SystemServices::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH};

    match reason {
        DLL_PROCESS_ATTACH => {
            // SAFETY: module is the handle the loader passed us.
            unsafe {
                let _ = DisableThreadLibraryCalls(module);
            }
            std::thread::spawn(worker);
        }
        DLL_PROCESS_DETACH => {
            if let Some(shutdown) = SHUTDOWN.get() {
                shutdown.trigger();
            }
        }
        _ => {}
    }
    true.into()
}
