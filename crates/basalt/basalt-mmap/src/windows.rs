use std::ffi::c_void;
use std::io;
use std::path::Path;
use std::ptr;
use tracing::debug;
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_ALREADY_EXISTS, GetLastError, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, FILE_MAP_READ, FILE_MAP_WRITE, MEMORY_BASIC_INFORMATION,
    MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, PAGE_READWRITE, UnmapViewOfFile, VirtualQuery,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

/// Name of the pagefile-backed section for `queue_name`.
pub fn section_name(queue_name: &str) -> String {
    format!("CT_IP_{queue_name}")
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// A read/write view of a queue's named section.
pub struct MemoryView {
    base: *mut u8,
    len: usize,
}

unsafe impl Send for MemoryView {}

impl MemoryView {
    /// Base address of the mapped region.
    #[inline]
    pub fn ptr(&self) -> *mut u8 {
        self.base
    }

    /// Total length of the mapped region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A named section holding a shared queue region.
///
/// The section is created on first open and destroyed by the kernel when the
/// last handle is closed; there is no filesystem artifact and no explicit
/// ownership to track.
pub struct MemoryFile {
    view: MemoryView,
    handle: HANDLE,
}

unsafe impl Send for MemoryFile {}

impl MemoryFile {
    /// Creates or opens the named section for `queue_name` and maps it.
    ///
    /// `root` and `create_or_override` only affect the POSIX file backend and
    /// are ignored here. Attaching to an existing section whose size does
    /// not match `total_bytes` fails: the name is already claimed by a queue
    /// with different options.
    pub fn create_or_open(
        _root: &Path,
        queue_name: &str,
        total_bytes: u64,
        _create_or_override: bool,
    ) -> io::Result<Self> {
        let name = wide(&section_name(queue_name));
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                ptr::null(),
                PAGE_READWRITE,
                (total_bytes >> 32) as u32,
                total_bytes as u32,
                name.as_ptr(),
            )
        };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        let already_exists = unsafe { GetLastError() } == ERROR_ALREADY_EXISTS;

        let addr: MEMORY_MAPPED_VIEW_ADDRESS =
            unsafe { MapViewOfFile(handle, FILE_MAP_READ | FILE_MAP_WRITE, 0, 0, 0) };
        if addr.Value.is_null() {
            let err = io::Error::last_os_error();
            unsafe { CloseHandle(handle) };
            return Err(err);
        }

        if already_exists {
            // The section was created by another process; any size other
            // than the one we were asked to attach to means the name is
            // claimed by an incompatible queue. Section sizes are rounded
            // up to page granularity, so the request is rounded the same
            // way before comparing.
            let mut info: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
            let queried = unsafe {
                VirtualQuery(
                    addr.Value as *const c_void,
                    &mut info,
                    std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            let mut sysinfo: SYSTEM_INFO = unsafe { std::mem::zeroed() };
            unsafe { GetSystemInfo(&mut sysinfo) };
            let page = u64::from(sysinfo.dwPageSize).max(1);
            let expected = total_bytes.div_ceil(page) * page;
            if queried == 0 || info.RegionSize as u64 != expected {
                unsafe {
                    UnmapViewOfFile(addr);
                    CloseHandle(handle);
                }
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "existing section {} is {} bytes, expected {total_bytes}",
                        section_name(queue_name),
                        info.RegionSize
                    ),
                ));
            }
        }

        debug!(
            section = %section_name(queue_name),
            bytes = total_bytes,
            attached = already_exists,
            "mapped queue section"
        );

        Ok(Self {
            view: MemoryView {
                base: addr.Value as *mut u8,
                len: total_bytes as usize,
            },
            handle,
        })
    }

    /// The mapped region.
    #[inline]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    /// Deletion is reference counted by the kernel; no instance owns it.
    pub fn is_owner(&self) -> bool {
        false
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        unsafe {
            UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS {
                Value: self.view.base as *mut c_void,
            });
            CloseHandle(self.handle);
        }
    }
}
