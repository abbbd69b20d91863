// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! System V shared memory segments addressed by filesystem path.

use crate::error::ShmemError;
use core::ptr::NonNull;
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::warn;

/// Project byte fed to `ftok` so unrelated users of the same path don't
/// collide with us.
const PROJECT_ID: libc::c_int = b'D' as libc::c_int;

/// Segment permissions on creation.
const SEGMENT_MODE: libc::c_int = 0o644;

/// An attached System V shared memory segment.
///
/// Created (if absent) and attached on [`Segment::attach`]; detached on drop
/// or explicitly via [`Segment::detach`]. Removal of the segment itself is a
/// separate, deliberate act ([`Segment::destroy`]) — detaching the last
/// process does not delete the data.
#[derive(Debug)]
pub struct Segment {
    id: libc::c_int,
    base: NonNull<u8>,
    len: usize,
    attached: bool,
}

fn path_key(path: &Path) -> Result<libc::key_t, ShmemError> {
    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| ShmemError::InvalidPath)?;
    // SAFETY: `cpath` is a valid NUL-terminated string.
    let key = unsafe { libc::ftok(cpath.as_ptr(), PROJECT_ID) };
    if key == -1 {
        return Err(ShmemError::Key(io::Error::last_os_error()));
    }
    Ok(key)
}

impl Segment {
    /// Creates (mode 0644) or opens the segment keyed by `path`, and maps it
    /// into this process. The path must name an existing filesystem entry.
    pub fn attach(path: &Path, len: usize) -> Result<Self, ShmemError> {
        let key = path_key(path)?;
        // SAFETY: plain syscall wrappers with checked return values.
        let id = unsafe { libc::shmget(key, len, SEGMENT_MODE | libc::IPC_CREAT) };
        if id == -1 {
            return Err(ShmemError::Create(io::Error::last_os_error()));
        }
        let addr = unsafe { libc::shmat(id, core::ptr::null(), 0) };
        if addr as isize == -1 {
            return Err(ShmemError::Attach(io::Error::last_os_error()));
        }
        let base = NonNull::new(addr as *mut u8).ok_or_else(|| {
            ShmemError::Attach(io::Error::new(io::ErrorKind::Other, "null mapping"))
        })?;
        Ok(Self {
            id,
            base,
            len,
            attached: true,
        })
    }

    pub fn id(&self) -> libc::c_int {
        self.id
    }

    /// The mapped region. Valid until this `Segment` detaches.
    pub fn region(&self) -> NonNull<[u8]> {
        NonNull::slice_from_raw_parts(self.base, self.len)
    }

    /// Detaches the mapping, invalidating every pointer derived from
    /// [`Segment::region`].
    pub fn detach(mut self) -> Result<(), ShmemError> {
        self.detach_inner()
    }

    fn detach_inner(&mut self) -> Result<(), ShmemError> {
        if !self.attached {
            return Ok(());
        }
        self.attached = false;
        // SAFETY: `base` came from a successful `shmat` and is detached at
        // most once.
        if unsafe { libc::shmdt(self.base.as_ptr() as *const libc::c_void) } == -1 {
            return Err(ShmemError::Detach(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Removes the segment keyed by `path`. Fails if no such segment exists.
    /// Processes still attached keep their mapping until they detach.
    pub fn destroy(path: &Path) -> Result<(), ShmemError> {
        let key = path_key(path)?;
        // No IPC_CREAT here: destroying an absent segment is an error, not a
        // create-then-remove.
        let id = unsafe { libc::shmget(key, 0, SEGMENT_MODE) };
        if id == -1 {
            return Err(ShmemError::Destroy(io::Error::last_os_error()));
        }
        if unsafe { libc::shmctl(id, libc::IPC_RMID, core::ptr::null_mut()) } == -1 {
            return Err(ShmemError::Destroy(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if let Err(err) = self.detach_inner() {
            warn!("leaking shared memory attachment: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn key_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        // ftok wants an existing, non-empty inode.
        f.write_all(b"denv test key file").unwrap();
        f
    }

    #[test]
    fn invalid_path_is_rejected() {
        let err = Segment::attach(Path::new("nu\0ll"), 4096).unwrap_err();
        assert!(matches!(err, ShmemError::InvalidPath));
    }

    #[test]
    fn missing_path_fails_key_derivation() {
        let err = Segment::attach(Path::new("/definitely/not/a/real/path"), 4096).unwrap_err();
        assert!(matches!(err, ShmemError::Key(_)));
    }

    #[test]
    fn attach_share_detach_destroy() {
        let file = key_file();
        let path = file.path();

        let first = Segment::attach(path, 4096).unwrap();
        let region = first.region();
        assert_eq!(region.len(), 4096);
        // SAFETY: freshly attached segment, exclusive in this test.
        unsafe { region.cast::<u8>().as_ptr().write(0xa5) };

        // A second attachment observes the same bytes.
        let second = Segment::attach(path, 4096).unwrap();
        let seen = unsafe { second.region().cast::<u8>().as_ptr().read() };
        assert_eq!(seen, 0xa5);

        second.detach().unwrap();
        first.detach().unwrap();
        Segment::destroy(path).unwrap();
        assert!(matches!(
            Segment::destroy(path),
            Err(ShmemError::Destroy(_))
        ));
    }
}
