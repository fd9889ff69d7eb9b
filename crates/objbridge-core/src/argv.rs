//! Owned copies of a process argument vector.
//!
//! Native toolkits commonly take `(int *argc, char ***argv)` at startup and
//! strip the options they understand. [`DuplicatedArgv`] owns a private copy
//! of the arguments, exposes it in that shape, and reconciles whatever the
//! native side did to it afterwards.

use std::ffi::{CString, c_char, c_int};
use std::fmt;

use crate::NativeError;

/// An independently-owned copy of an argument vector.
///
/// The pointer array is always NULL-terminated and its length always agrees
/// with the count once [`update`](Self::update) has run. Native code may only
/// remove or reorder entries; any pointer it introduces is rejected.
pub struct DuplicatedArgv {
    count: c_int,
    pointers: Vec<*mut c_char>,
    /// Indices into `storage`, in current order.
    remaining: Vec<usize>,
    storage: Vec<CString>,
}

impl DuplicatedArgv {
    /// Copy `program` followed by `args`.
    pub fn new<I, S>(program: &str, args: I) -> Result<Self, NativeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let storage = std::iter::once(program.to_string())
            .chain(args.into_iter().map(Into::into))
            .enumerate()
            .map(|(i, arg)| {
                CString::new(arg)
                    .map_err(|_| NativeError::ArgvCorrupted(format!("argument {i} contains NUL")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut argv = Self {
            count: 0,
            pointers: Vec::new(),
            remaining: (0..storage.len()).collect(),
            storage,
        };
        argv.rebuild();
        Ok(argv)
    }

    /// Copy the arguments of the current process.
    pub fn from_env() -> Result<Self, NativeError> {
        let mut args = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
        let program = args.next().unwrap_or_default();
        Self::new(&program, args)
    }

    /// Number of arguments, including the program name.
    pub fn count(&self) -> usize {
        self.remaining.len()
    }

    /// The `(argc, argv)` pair to hand to native code.
    ///
    /// Call [`update`](Self::update) once native code returns.
    pub fn native_parts(&mut self) -> (&mut c_int, *mut *mut c_char) {
        (&mut self.count, self.pointers.as_mut_ptr())
    }

    /// Reconcile the copy with changes native code made through
    /// [`native_parts`](Self::native_parts).
    ///
    /// On error the vector is restored to its state before the native call.
    pub fn update(&mut self) -> Result<(), NativeError> {
        match self.validate() {
            Ok(remaining) => {
                self.remaining = remaining;
                self.rebuild();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "discarding native changes to argument vector");
                self.rebuild();
                Err(err)
            }
        }
    }

    /// The remaining arguments.
    pub fn remaining(&self) -> Vec<String> {
        self.remaining
            .iter()
            .map(|&i| self.storage[i].to_string_lossy().into_owned())
            .collect()
    }

    /// Consume the copy, returning the remaining arguments.
    pub fn into_remaining(self) -> Vec<String> {
        self.remaining()
    }

    fn validate(&self) -> Result<Vec<usize>, NativeError> {
        let previous = self.remaining.len();
        let count = usize::try_from(self.count)
            .map_err(|_| NativeError::ArgvCorrupted(format!("negative count {}", self.count)))?;
        if count > previous {
            return Err(NativeError::ArgvCorrupted(format!(
                "count grew from {previous} to {count}"
            )));
        }

        let mut seen = vec![false; self.storage.len()];
        let mut remaining = Vec::with_capacity(count);
        for (slot, &ptr) in self.pointers[..count].iter().enumerate() {
            let index = self
                .storage
                .iter()
                .position(|arg| arg.as_ptr() == ptr.cast_const())
                .ok_or_else(|| {
                    NativeError::ArgvCorrupted(format!("foreign pointer at position {slot}"))
                })?;
            if std::mem::replace(&mut seen[index], true) {
                return Err(NativeError::ArgvCorrupted(format!(
                    "duplicate pointer at position {slot}"
                )));
            }
            remaining.push(index);
        }
        Ok(remaining)
    }

    fn rebuild(&mut self) {
        self.pointers.clear();
        self.pointers.extend(
            self.remaining
                .iter()
                .map(|&i| self.storage[i].as_ptr().cast_mut()),
        );
        self.pointers.push(std::ptr::null_mut());
        self.count = self.remaining.len() as c_int;
    }
}

impl fmt::Debug for DuplicatedArgv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicatedArgv")
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    /// Removes every `flag` argument the way a toolkit init routine does.
    unsafe fn strip(argc: &mut c_int, argv: *mut *mut c_char, flag: &str) {
        let mut write = 0;
        for read in 0..*argc as usize {
            let ptr = unsafe { *argv.add(read) };
            let arg = unsafe { CStr::from_ptr(ptr) };
            if arg.to_str() != Ok(flag) {
                unsafe { *argv.add(write) = ptr };
                write += 1;
            }
        }
        unsafe { *argv.add(write) = std::ptr::null_mut() };
        *argc = write as c_int;
    }

    #[test]
    fn copies_program_and_args() {
        let argv = DuplicatedArgv::new("app", ["--sync", "file.txt"]).unwrap();
        assert_eq!(argv.count(), 3);
        assert_eq!(argv.remaining(), vec!["app", "--sync", "file.txt"]);
    }

    #[test]
    fn native_parts_are_null_terminated() {
        let mut argv = DuplicatedArgv::new("app", ["a"]).unwrap();
        let (argc, ptrs) = argv.native_parts();
        assert_eq!(*argc, 2);
        assert!(unsafe { (*ptrs.add(2)).is_null() });
    }

    #[test]
    fn update_reflects_native_removal() {
        let mut argv = DuplicatedArgv::new("app", ["--sync", "file.txt", "--sync"]).unwrap();
        let (argc, ptrs) = argv.native_parts();
        unsafe { strip(argc, ptrs, "--sync") };
        argv.update().unwrap();
        assert_eq!(argv.count(), 2);
        assert_eq!(argv.into_remaining(), vec!["app", "file.txt"]);
    }

    #[test]
    fn update_rejects_grown_count() {
        let mut argv = DuplicatedArgv::new("app", ["a"]).unwrap();
        let (argc, _) = argv.native_parts();
        *argc = 5;
        assert!(matches!(argv.update(), Err(NativeError::ArgvCorrupted(_))));
        assert_eq!(argv.count(), 2);
        let (argc, _) = argv.native_parts();
        assert_eq!(*argc, 2);
    }

    #[test]
    fn update_rejects_foreign_pointer() {
        let mut argv = DuplicatedArgv::new("app", ["a"]).unwrap();
        let foreign = CString::new("evil").unwrap();
        let (_, ptrs) = argv.native_parts();
        unsafe { *ptrs.add(1) = foreign.as_ptr().cast_mut() };
        assert!(argv.update().is_err());
        assert_eq!(argv.remaining(), vec!["app", "a"]);
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(DuplicatedArgv::new("app", ["a\0b"]).is_err());
    }
}
