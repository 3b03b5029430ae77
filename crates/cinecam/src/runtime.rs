//! Tool lifecycle: initialization, the tool-thread loop, teardown.
//!
//! Init order matters: process and swapchain discovery are the fatal
//! steps and run before anything is patched, the signature scan runs
//! before any hook so scanned offsets win over the hardcoded table,
//! and a hook that fails to install is skipped rather than aborting
//! the rest.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use cinecam_core::{CameraManager, Error, HookManager, OffsetResolver, Signature, ToolConfig};
use tracing::{info, warn};

use crate::hooks::{self, DetourContext, MinHookBackend};
use crate::input::Win32Poller;
use crate::process::ProcessContext;
use crate::shared::SharedCameraState;
use crate::shutdown::ShutdownSignal;

const MODULE_NAME: &str = "theHunterCotW_F.exe";
const WINDOW_CLASS: &str = "CApexWindow";
const WINDOW_TITLE: &str = "theHunter: Call of the Wild";

const CONFIG_FILE: &str = "./cinecam/config.toml";
const TRACK_FILE: &str = "./cinecam/track.json";

const TICK: Duration = Duration::from_millis(10);
const CONFIG_SAVE_INTERVAL: f32 = 10.0;

const CAMERA_UPDATE_HOOK: &str = "CameraUpdate";
const PRESENT_HOOK: &str = "SwapChainPresent";
const SWAPCHAIN_PTR: &str = "SwapchainPtr";

/// Everything from injection to unload. Returns only on shutdown or a
/// fatal initialization error.
pub fn run(shutdown: Arc<ShutdownSignal>) -> anyhow::Result<()> {
    let process = ProcessContext::discover(MODULE_NAME, WINDOW_CLASS, WINDOW_TITLE)
        .context("locating the game process")?;
    tracing::debug!("Game window {:?}", process.window);

    let mut resolver = OffsetResolver::new(process.module_base as u64);
    register_offsets(&mut resolver).context("compiling signatures")?;
    // SAFETY: read-only scan of the live module image, which stays
    // loaded for the lifetime of this process.
    resolver.scan(unsafe { process.module_bytes() });

    // Losing the swapchain means no teardown-safe vtable hook and no
    // overlay; abort before anything is patched.
    let swapchain_vtable = locate_swapchain_vtable(&resolver).context("locating the swapchain")?;

    let shared = Arc::new(SharedCameraState::new());
    let ctx = hooks::install_detour_context(Arc::clone(&shared));

    let mut hook_manager =
        HookManager::new(MinHookBackend).context("initializing the patch backend")?;
    install_hooks(&mut hook_manager, &resolver, swapchain_vtable, ctx);

    let mut camera = CameraManager::new();
    camera.read_config(&ToolConfig::load(CONFIG_FILE));
    if Path::new(TRACK_FILE).exists()
        && let Err(e) = camera.track_player_mut().load_track(TRACK_FILE)
    {
        warn!("Could not load saved track: {e}");
    }

    let poller = Win32Poller::new();
    let mut saved_config = camera.get_config();
    let mut save_timer = 0.0f32;
    let mut last_tick = Instant::now();

    info!("cinecam running");
    while !shutdown.is_triggered() {
        let dt = last_tick.elapsed().as_secs_f32();
        last_tick = Instant::now();

        if let Some(rows) = shared.captured() {
            camera.set_reset_transform(&rows);
        }
        camera.hotkey_update(&poller);
        camera.update(dt, &poller);
        shared.publish_override(&camera.pose().to_row_matrix());
        shared.set_enabled(camera.is_camera_enabled());

        save_timer += dt;
        if save_timer > CONFIG_SAVE_INTERVAL {
            save_timer = 0.0;
            let current = camera.get_config();
            if current != saved_config {
                match current.save(CONFIG_FILE) {
                    Ok(()) => saved_config = current,
                    Err(e) => warn!("Could not save config: {e}"),
                }
            }
        }

        shutdown.wait(TICK);
    }

    teardown(&mut hook_manager, &camera);
    Ok(())
}

fn register_offsets(resolver: &mut OffsetResolver) -> cinecam_core::Result<()> {
    resolver.register_signature(
        CAMERA_UPDATE_HOOK,
        Signature::compile("48 8B C4 F3 0F 11 58 ?? F3 0F 11 50 ?? 48 89 ?? 08 55")?,
    );
    resolver.register_hardcoded(CAMERA_UPDATE_HOOK, 0x3F9_F9D0);

    // mov rax, [rip+disp] loading the renderer's swapchain pointer.
    resolver.register_signature(
        SWAPCHAIN_PTR,
        Signature::compile("48 8B 05 [ ?? ?? ?? ?? ] 48 8B 88 ?? ?? 00 00 48 85 C9")?,
    );
    resolver.register_hardcoded(SWAPCHAIN_PTR, 0x1A1_2288);
    Ok(())
}

fn install_hooks(
    manager: &mut HookManager<MinHookBackend>,
    resolver: &OffsetResolver,
    swapchain_vtable: usize,
    ctx: &'static DetourContext,
) {
    match resolver.resolve(CAMERA_UPDATE_HOOK) {
        Ok(address) => {
            let result = manager
                .install_trampoline(
                    CAMERA_UPDATE_HOOK,
                    address as usize,
                    hooks::camera_update_detour as usize,
                )
                .and_then(|()| {
                    // The detour forwards through this before it is armed.
                    ctx.set_camera_original(manager.original(CAMERA_UPDATE_HOOK)?);
                    manager.set_state(true, Some(CAMERA_UPDATE_HOOK))
                });
            if let Err(e) = result {
                warn!("{e}");
            }
        }
        Err(e) => warn!("{e}"),
    }

    let result = manager
        .install_vtable_slot(
            PRESENT_HOOK,
            swapchain_vtable,
            hooks::PRESENT_SLOT,
            hooks::present_detour as usize,
        )
        .and_then(|()| {
            ctx.set_present_original(manager.original(PRESENT_HOOK)?);
            Ok(())
        });
    if let Err(e) = result {
        warn!("{e}");
    }
}

/// Follow the resolved static pointer to the swapchain object and read
/// its vtable pointer.
fn locate_swapchain_vtable(resolver: &OffsetResolver) -> cinecam_core::Result<usize> {
    let address = resolver.resolve(SWAPCHAIN_PTR)? as usize;
    // SAFETY: address points at a static pointer slot inside the module.
    let swapchain = unsafe { (address as *const usize).read_unaligned() };
    if swapchain == 0 {
        return Err(Error::Patch(
            "swapchain pointer not populated yet".to_string(),
        ));
    }
    // SAFETY: a COM object's first qword is its vtable pointer.
    let vtable = unsafe { (swapchain as *const usize).read() };
    if vtable == 0 {
        return Err(Error::Patch("swapchain has no vtable".to_string()));
    }
    Ok(vtable)
}

fn teardown(manager: &mut HookManager<MinHookBackend>, camera: &CameraManager) {
    info!("cinecam shutting down");
    if let Err(e) = camera.get_config().save(CONFIG_FILE) {
        warn!("Could not save config: {e}");
    }
    if !camera.track_player().selected_track().nodes.is_empty()
        && let Err(e) = camera.track_player().save_selected(TRACK_FILE)
    {
        warn!("Could not save track: {e}");
    }
    if let Err(e) = manager.set_state(false, None) {
        warn!("Could not disable hooks: {e}");
    }
    if let Err(e) = manager.shutdown() {
        warn!("Hook teardown failed: {e}");
    }
}
