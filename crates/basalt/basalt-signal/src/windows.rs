use std::io;
use std::path::Path;
use std::ptr;
use std::time::Duration;
use tracing::debug;
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows_sys::Win32::System::Threading::{
    CreateSemaphoreW, ReleaseSemaphore, WaitForSingleObject,
};

/// Kernel object names are namespaced per session and shared across object
/// types, so the semaphore cannot reuse the section's `CT_IP_<queue>` name.
fn semaphore_name(queue_name: &str) -> Vec<u16> {
    format!("CT_IP_{queue_name}.sem")
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect()
}

/// One named counting semaphore shared by all publishers and subscribers of
/// a queue. Created on first use, opened thereafter, destroyed by the kernel
/// with the last handle.
struct NamedSemaphore {
    handle: HANDLE,
}

unsafe impl Send for NamedSemaphore {}

impl NamedSemaphore {
    fn create(queue_name: &str) -> io::Result<Self> {
        let name = semaphore_name(queue_name);
        let handle = unsafe { CreateSemaphoreW(ptr::null(), 0, i32::MAX, name.as_ptr()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { handle })
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.handle) };
    }
}

/// The publishing side of the wake-up signal.
pub struct SignalReleaser {
    semaphore: NamedSemaphore,
}

impl SignalReleaser {
    pub fn create(_root: &Path, queue_name: &str) -> io::Result<Self> {
        Ok(Self {
            semaphore: NamedSemaphore::create(queue_name)?,
        })
    }

    /// Wakes at least one parked waiter. Must not fail the caller's publish;
    /// a saturated semaphore just means waiters already have wake-ups queued.
    pub fn release(&self) {
        let ok =
            unsafe { ReleaseSemaphore(self.semaphore.handle, 1, ptr::null_mut()) };
        if ok == 0 {
            debug!(error = %io::Error::last_os_error(), "semaphore release skipped");
        }
    }
}

/// The subscribing side of the wake-up signal.
pub struct SignalWaiter {
    semaphore: NamedSemaphore,
}

impl SignalWaiter {
    pub fn create(_root: &Path, queue_name: &str) -> io::Result<Self> {
        Ok(Self {
            semaphore: NamedSemaphore::create(queue_name)?,
        })
    }

    /// Parks until a release arrives or `timeout` elapses. Returns `true` on
    /// a wake-up.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let millis = timeout.as_millis().min(u128::from(u32::MAX - 1)) as u32;
        unsafe { WaitForSingleObject(self.semaphore.handle, millis) == WAIT_OBJECT_0 }
    }
}
