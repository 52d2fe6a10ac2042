//! System V shared memory segments.

use crate::shm::ShmError;

use std::io;
use std::ptr::NonNull;

use tracing::trace;
use tracing::warn;

/// A segment attached to this process, detached on drop.
#[derive(Debug)]
pub struct Segment<T> {
    pub id: i32,
    ptr: NonNull<T>,
}

// The segment is only written through volatile accesses, the writer protocol of each user
// keeps readers consistent.
unsafe impl<T> Send for Segment<T> {}
unsafe impl<T> Sync for Segment<T> {}

impl<T> Segment<T> {
    /// Attach the segment for `key`, creating it with `permissions` when `create` is set.
    pub fn attach(key: i32, permissions: i32, create: bool) -> Result<Self, ShmError> {
        let size = std::mem::size_of::<T>();
        let flags = if create {
            libc::IPC_CREAT | permissions
        } else {
            0
        };

        let id = unsafe { libc::shmget(key, size, flags) };

        if id == -1 {
            return Err(ShmError::Get {
                key,
                source: io::Error::last_os_error(),
            });
        }

        let shm = unsafe { libc::shmat(id, std::ptr::null(), 0) };

        if shm as isize == -1 {
            return Err(ShmError::Attach {
                id,
                source: io::Error::last_os_error(),
            });
        }

        let ptr = NonNull::new(shm as *mut T).ok_or(ShmError::Attach {
            id,
            source: io::Error::from(io::ErrorKind::InvalidData),
        })?;

        trace!("attached shared memory {:#x} as segment {}", key, id);

        Ok(Segment { id, ptr })
    }

    /// Destroy the segment once the last process detaches.
    pub fn remove_on_detach(&self) {
        let result = unsafe { libc::shmctl(self.id, libc::IPC_RMID, std::ptr::null_mut()) };

        if result == -1 {
            warn!(
                "unable to mark shared memory segment {} for removal: {}",
                self.id,
                io::Error::last_os_error()
            );
        }
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> Drop for Segment<T> {
    fn drop(&mut self) {
        let result = unsafe { libc::shmdt(self.ptr.as_ptr() as *const libc::c_void) };

        if result == -1 {
            warn!(
                "unable to detach shared memory segment {}: {}",
                self.id,
                io::Error::last_os_error()
            );
        }
    }
}
