//! In-process execution of a compiled image.
//!
//! The image is copied into an anonymous RWX mapping and invoked
//! through its C entry point, `int64_t (*)(void *data_stack)`. The data
//! stack is a separate RW mapping handed to the entry stub. Both
//! mappings are released when the program is dropped, whether the
//! invocation ran or not.

use std::io;
use std::ptr;

/// Size of the data stack handed to the compiled program.
pub const DATA_STACK_SIZE: usize = 8 << 20;

/// A compiled program mapped into executable memory, plus its data
/// stack.
#[derive(Debug)]
pub struct MemProgram {
    code: *mut libc::c_void,
    code_len: usize,
    stack: *mut libc::c_void,
}

impl MemProgram {
    /// Map the image into executable memory and allocate the data
    /// stack.
    pub fn new(image: &[u8]) -> io::Result<MemProgram> {
        let code = unsafe {
            libc::mmap(
                ptr::null_mut(),
                image.len(),
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if code == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        unsafe {
            ptr::copy_nonoverlapping(image.as_ptr(), code as *mut u8, image.len());
        }

        let stack = unsafe {
            libc::mmap(
                ptr::null_mut(),
                DATA_STACK_SIZE,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if stack == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe {
                libc::munmap(code, image.len());
            }
            return Err(err);
        }

        Ok(MemProgram {
            code,
            code_len: image.len(),
            stack,
        })
    }

    /// Run the program and return `main`'s value.
    ///
    /// # Safety
    ///
    /// The mapped bytes are executed as-is. The caller must only hand
    /// this wrapper images produced by the emitter; runtime faults of
    /// the compiled program (bad pointers, division by zero) surface as
    /// OS signals, not Rust panics.
    pub unsafe fn invoke(&self) -> i64 {
        let entry: unsafe extern "C" fn(*mut libc::c_void) -> i64 =
            std::mem::transmute(self.code);
        entry(self.stack)
    }
}

impl Drop for MemProgram {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.code, self.code_len);
            libc::munmap(self.stack, DATA_STACK_SIZE);
        }
    }
}
