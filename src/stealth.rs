use std::sync::atomic::{AtomicIsize, Ordering};

use log::{info, warn};

/// Marks the application window invisible to screen-capture and recording
/// APIs while it stays visible to the local user.
///
/// Best-effort by contract: `set_hidden` never fails loudly. If the platform
/// call cannot be made, visibility is left unchanged and the failure is
/// logged. Callers that need certainty rely on the capture pipeline's settle
/// delay instead of a return value.
pub trait StealthController: Send + Sync {
    fn set_hidden(&self, hidden: bool);
}

/// Platform implementation.
///
/// On Windows this drives `SetWindowDisplayAffinity` with
/// `WDA_EXCLUDEFROMCAPTURE` against the top-level window handle the embedding
/// shell attaches. Other platforms currently log that stealth is unavailable.
pub struct PlatformStealth {
    // Raw HWND as isize; 0 means no window attached yet.
    hwnd: AtomicIsize,
}

#[cfg(windows)]
const WDA_NONE: u32 = 0x0000_0000;
#[cfg(windows)]
const WDA_EXCLUDEFROMCAPTURE: u32 = 0x0000_0011;

impl PlatformStealth {
    pub fn new() -> Self {
        Self {
            hwnd: AtomicIsize::new(0),
        }
    }

    /// Attach the top-level window's raw handle. Called once by the shell
    /// after the window exists; until then `set_hidden` is a logged no-op.
    pub fn attach_window(&self, raw_handle: isize) {
        self.hwnd.store(raw_handle, Ordering::SeqCst);
        info!("Stealth controller attached to window handle {raw_handle:#x}");
    }
}

impl Default for PlatformStealth {
    fn default() -> Self {
        Self::new()
    }
}

impl StealthController for PlatformStealth {
    #[allow(unused_variables)]
    fn set_hidden(&self, hidden: bool) {
        let handle = self.hwnd.load(Ordering::SeqCst);
        if handle == 0 {
            warn!("Stealth requested but no window handle is attached");
            return;
        }

        #[cfg(windows)]
        {
            use winapi::shared::windef::HWND;
            use winapi::um::winuser::SetWindowDisplayAffinity;

            let affinity = if hidden {
                WDA_EXCLUDEFROMCAPTURE
            } else {
                WDA_NONE
            };
            let ok = unsafe { SetWindowDisplayAffinity(handle as HWND, affinity) };
            if ok != 0 {
                info!(
                    "Stealth mode {}",
                    if hidden { "enabled" } else { "disabled" }
                );
            } else {
                warn!("SetWindowDisplayAffinity failed; window visibility unchanged");
            }
        }

        #[cfg(not(windows))]
        {
            warn!("Stealth mode is not supported on this platform");
        }
    }
}
