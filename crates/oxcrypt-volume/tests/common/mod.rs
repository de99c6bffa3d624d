//! Recording fakes for volume lifecycle tests.
//!
//! Choosers, mounter and handles all append to one shared [`EventLog`], so a
//! test can assert on the exact order of calls across collaborators.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use oxcrypt_volume::{ChooserError, MountHandle, MountOptions, MountPointChooser, VolumeMounter};
use parking_lot::Mutex;

/// A call observed by one of the fakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Choose(String),
    Prepare(String, PathBuf),
    Cleanup(String, PathBuf),
    Mount(MountOptions),
    Unmount { forced: bool },
    Release,
}

/// Shared, ordered record of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn cleanups(&self) -> Vec<(String, PathBuf)> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Cleanup(id, path) => Some((id.clone(), path.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn consulted(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Choose(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn releases(&self) -> usize {
        self.count(|e| *e == Event::Release)
    }

    pub fn mounts(&self) -> usize {
        self.count(|e| matches!(e, Event::Mount(_)))
    }
}

/// What a [`RecordingChooser`] does in `prepare`.
#[derive(Debug, Clone, Copy)]
pub enum Prepare {
    /// Succeed, returning the given cleanup flag
    Ok(bool),
    /// Fail with a preparation error
    Fail,
}

/// Chooser with a fixed candidate and scripted preparation.
pub struct RecordingChooser {
    id: String,
    candidate: Option<PathBuf>,
    prepare: Prepare,
    log: EventLog,
}

impl RecordingChooser {
    pub fn boxed(
        id: &str,
        candidate: Option<&str>,
        prepare: Prepare,
        log: &EventLog,
    ) -> Box<dyn MountPointChooser> {
        Box::new(Self {
            id: id.to_string(),
            candidate: candidate.map(PathBuf::from),
            prepare,
            log: log.clone(),
        })
    }
}

impl MountPointChooser for RecordingChooser {
    fn id(&self) -> &str {
        &self.id
    }

    fn choose_mount_point(&self) -> Option<PathBuf> {
        self.log.push(Event::Choose(self.id.clone()));
        self.candidate.clone()
    }

    fn prepare(&self, path: &Path) -> Result<bool, ChooserError> {
        self.log
            .push(Event::Prepare(self.id.clone(), path.to_path_buf()));
        match self.prepare {
            Prepare::Ok(cleanup_required) => Ok(cleanup_required),
            Prepare::Fail => Err(ChooserError::AlreadyExists(path.to_path_buf())),
        }
    }

    fn cleanup(&self, path: &Path) {
        self.log
            .push(Event::Cleanup(self.id.clone(), path.to_path_buf()));
    }
}

/// Knobs shared by a [`FakeMounter`] and every handle it hands out.
#[derive(Debug, Default)]
pub struct Script {
    /// Fail the next `mount` call
    pub fail_mount: AtomicBool,
    /// Number of upcoming unmount calls (graceful or forced) that fail
    pub failing_unmounts: AtomicUsize,
    /// Fail `reveal_in_file_manager`
    pub fail_reveal: AtomicBool,
}

impl Script {
    pub fn fail_next_unmounts(&self, n: usize) {
        self.failing_unmounts.store(n, Ordering::SeqCst);
    }

    fn take_unmount_failure(&self) -> bool {
        self.failing_unmounts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Mounter that records options and hands out [`FakeHandle`]s.
pub struct FakeMounter {
    pub script: Arc<Script>,
    log: EventLog,
}

impl FakeMounter {
    pub fn new(log: &EventLog) -> Self {
        Self {
            script: Arc::new(Script::default()),
            log: log.clone(),
        }
    }
}

impl VolumeMounter for FakeMounter {
    fn mount(&self, _root: &Path, options: &MountOptions) -> io::Result<Box<dyn MountHandle>> {
        self.log.push(Event::Mount(options.clone()));
        if self.script.fail_mount.swap(false, Ordering::SeqCst) {
            return Err(io::Error::other("fuse: device not found"));
        }
        Ok(Box::new(FakeHandle {
            script: Arc::clone(&self.script),
            log: self.log.clone(),
            released: false,
        }))
    }
}

/// Handle whose unmount outcome is driven by [`Script`].
pub struct FakeHandle {
    script: Arc<Script>,
    log: EventLog,
    released: bool,
}

impl FakeHandle {
    fn unmount_inner(&mut self, forced: bool) -> io::Result<()> {
        assert!(!self.released, "unmount after release");
        self.log.push(Event::Unmount { forced });
        if self.script.take_unmount_failure() {
            return Err(io::Error::new(
                io::ErrorKind::ResourceBusy,
                "Device or resource busy",
            ));
        }
        Ok(())
    }
}

impl MountHandle for FakeHandle {
    fn unmount(&mut self) -> io::Result<()> {
        self.unmount_inner(false)
    }

    fn unmount_forced(&mut self) -> io::Result<()> {
        self.unmount_inner(true)
    }

    fn reveal_in_file_manager(&self) -> io::Result<()> {
        if self.script.fail_reveal.load(Ordering::SeqCst) {
            return Err(io::Error::other("no file manager"));
        }
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.push(Event::Release);
        }
    }
}
