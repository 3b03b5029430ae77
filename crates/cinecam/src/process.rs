//! Target process discovery.
//!
//! Runs inside the game process, so "discovery" is locating the game
//! window and the main module's load address and size. Both must exist
//! before any hook is installed; failure here is fatal.

use cinecam_core::{Error, Result};
#[cfg(target_os = "windows")]
use tracing::info;

#[cfg(target_os = "windows")]
pub struct ProcessContext {
    pub module_base: usize,
    pub module_size: usize,
    pub window: windows::Win32::Foundation::HWND,
}

#[cfg(target_os = "windows")]
impl ProcessContext {
    /// Locate the game window (by class, then by title) and the main
    /// module of the current process.
    pub fn discover(module_name: &str, window_class: &str, window_title: &str) -> Result<Self> {
        use windows::Win32::System::ProcessStatus::{K32GetModuleInformation, MODULEINFO};
        use windows::Win32::System::Threading::GetCurrentProcess;

        let window = find_window(window_class, window_title)?;

        let module = std::ffi::CString::new(module_name)
            .map_err(|_| Error::ModuleNotFound(module_name.to_string()))?;
        // SAFETY: the CString outlives the call; a null result means the
        // module is not loaded in this process.
        let handle = unsafe {
            windows::Win32::System::LibraryLoader::GetModuleHandleA(
                windows::core::PCSTR(module.as_ptr() as _),
            )
        }
        .map_err(|e| Error::ModuleNotFound(format!("{module_name}: {e}")))?;

        let mut info = MODULEINFO::default();
        // SAFETY: handle is a live module of our own process; the struct
        // size is passed so the kernel writes only what fits.
        let ok = unsafe {
            K32GetModuleInformation(
                GetCurrentProcess(),
                handle,
                &mut info,
                std::mem::size_of::<MODULEINFO>() as u32,
            )
        };
        if !ok.as_bool() {
            return Err(Error::ModuleNotFound(format!(
                "{module_name}: GetModuleInformation failed"
            )));
        }

        let context = Self {
            module_base: info.lpBaseOfDll as usize,
            module_size: info.SizeOfImage as usize,
            window,
        };
        info!(
            "Found module {module_name} at {:#x} ({} bytes)",
            context.module_base, context.module_size
        );
        Ok(context)
    }

    /// The loaded module image as a byte slice, for signature scanning.
    ///
    /// # Safety
    ///
    /// The returned slice aliases live executable memory. The caller
    /// must only read it, and only while the module stays loaded.
    pub unsafe fn module_bytes(&self) -> &[u8] {
        // SAFETY: base/size come from GetModuleInformation for a module
        // that cannot unload while we run inside it.
        unsafe { std::slice::from_raw_parts(self.module_base as *const u8, self.module_size) }
    }
}

#[cfg(target_os = "windows")]
fn find_window(window_class: &str, window_title: &str) -> Result<windows::Win32::Foundation::HWND> {
    use windows::Win32::UI::WindowsAndMessaging::FindWindowA;
    use windows::core::PCSTR;

    let class = std::ffi::CString::new(window_class)
        .map_err(|_| Error::WindowNotFound(window_class.to_string()))?;
    let title = std::ffi::CString::new(window_title)
        .map_err(|_| Error::WindowNotFound(window_title.to_string()))?;

    // SAFETY: both CStrings outlive the calls.
    let by_class = unsafe { FindWindowA(PCSTR(class.as_ptr() as _), PCSTR::null()) };
    if let Ok(hwnd) = by_class {
        return Ok(hwnd);
    }
    // SAFETY: as above.
    unsafe { FindWindowA(PCSTR::null(), PCSTR(title.as_ptr() as _)) }
        .map_err(|e| Error::WindowNotFound(format!("'{window_class}' / '{window_title}': {e}")))
}

// --- Non-Windows stubs ---

#[cfg(not(target_os = "windows"))]
pub struct ProcessContext {
    pub module_base: usize,
    pub module_size: usize,
}

#[cfg(not(target_os = "windows"))]
impl ProcessContext {
    pub fn discover(module_name: &str, _window_class: &str, _window_title: &str) -> Result<Self> {
        Err(Error::ModuleNotFound(format!(
            "{module_name}: process discovery is only supported on Windows"
        )))
    }
}
