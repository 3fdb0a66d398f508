//! In-RAM flat file table: a thin stand-in for the real filesystem
//! named in spec.md §1, just enough for the shell to `ls`/`cat`/`write`
//! under QEMU. Not part of the tested core (spec §6 ambient note).

use alloc::{collections::BTreeMap, string::String, vec::Vec};

use spin::Mutex;

use crate::sync::once_lock::GlobalState;

/// No directories, no permissions -- a flat `name -> bytes` map.
struct FlatFs {
    files: BTreeMap<String, Vec<u8>>,
}

static FS: GlobalState<Mutex<FlatFs>> = GlobalState::new();

pub fn init() {
    FS.init(Mutex::new(FlatFs {
        files: BTreeMap::new(),
    }))
    .unwrap_or_else(|_| panic!("flat file table initialized twice"));
}

fn with_fs<R>(f: impl FnOnce(&mut FlatFs) -> R) -> R {
    FS.with_mut(|mtx| f(&mut mtx.lock()))
        .expect("flat file table used before init")
}

/// Create or overwrite a file with `contents`.
pub fn write(name: &str, contents: &[u8]) {
    with_fs(|fs| {
        fs.files.insert(String::from(name), Vec::from(contents));
    });
}

/// Read a file's contents, or `None` if it doesn't exist.
pub fn read(name: &str) -> Option<Vec<u8>> {
    with_fs(|fs| fs.files.get(name).cloned())
}

/// Remove a file, returning whether it existed.
pub fn remove(name: &str) -> bool {
    with_fs(|fs| fs.files.remove(name).is_some())
}

/// File names, in sorted order.
pub fn list() -> Vec<String> {
    with_fs(|fs| fs.files.keys().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    // `FS` is a process-wide singleton that can only `init()` once, so
    // every scenario below runs in one test instead of racing another
    // test's `init()` call.
    #[test]
    fn flat_fs_scenarios() {
        init();

        assert_eq!(read("missing"), None);

        write("a.txt", b"hello");
        assert_eq!(read("a.txt"), Some(Vec::from(b"hello".as_slice())));
        assert_eq!(list(), alloc::vec![String::from("a.txt")]);

        write("a.txt", b"overwritten");
        assert_eq!(read("a.txt"), Some(Vec::from(b"overwritten".as_slice())));

        write("b.txt", b"second");
        assert_eq!(
            list(),
            alloc::vec![String::from("a.txt"), String::from("b.txt")]
        );

        assert!(remove("a.txt"));
        assert!(!remove("a.txt"));
        assert_eq!(list(), alloc::vec![String::from("b.txt")]);
    }
}
