//! Process liveness probe and best-effort signalling.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::io;

/// Probe and signal OS processes by pid.
pub trait ProcessControl {
    /// Pid of the calling process.
    fn current_pid(&self) -> i32;

    /// Whether `pid` denotes a live process this caller may signal. Never
    /// fails; pids <= 0 and processes owned by someone else are reported as
    /// not existing.
    fn exists(&self, pid: i32) -> bool;

    /// Ask the process to stop (SIGINT). No wait, no confirmation.
    fn interrupt(&self, pid: i32) -> io::Result<()>;
}

impl<T: ProcessControl + ?Sized> ProcessControl for &T {
    fn current_pid(&self) -> i32 {
        (**self).current_pid()
    }

    fn exists(&self, pid: i32) -> bool {
        (**self).exists(pid)
    }

    fn interrupt(&self, pid: i32) -> io::Result<()> {
        (**self).interrupt(pid)
    }
}

/// The real OS, via `kill(2)`.
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn current_pid(&self) -> i32 {
        std::process::id() as i32
    }

    fn exists(&self, pid: i32) -> bool {
        if pid <= 0 {
            return false;
        }
        // kill(pid, 0) probes without sending a signal. EPERM means the pid
        // was reused by another user's process: not ours to track.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    fn interrupt(&self, pid: i32) -> io::Result<()> {
        if pid <= 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to signal pid {}", pid),
            ));
        }
        if unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Test double: a fixed own pid, a set of live pids, and a log of signals.
pub struct MockProcesses {
    own_pid: i32,
    alive: RefCell<HashSet<i32>>,
    foreign: RefCell<HashSet<i32>>,
    interrupted: RefCell<Vec<i32>>,
    refuse_signals: Cell<bool>,
}

impl MockProcesses {
    pub fn new(own_pid: i32) -> Self {
        let mut alive = HashSet::new();
        alive.insert(own_pid);
        MockProcesses {
            own_pid,
            alive: RefCell::new(alive),
            foreign: RefCell::new(HashSet::new()),
            interrupted: RefCell::new(Vec::new()),
            refuse_signals: Cell::new(false),
        }
    }

    pub fn spawn(&self, pid: i32) {
        self.alive.borrow_mut().insert(pid);
    }

    /// A live process owned by another user: present, but refuses signals.
    pub fn spawn_foreign(&self, pid: i32) {
        self.spawn(pid);
        self.foreign.borrow_mut().insert(pid);
    }

    pub fn reap(&self, pid: i32) {
        self.alive.borrow_mut().remove(&pid);
    }

    /// Make every `interrupt` fail with EPERM.
    pub fn refuse_signals(&self) {
        self.refuse_signals.set(true);
    }

    pub fn interrupted(&self) -> Vec<i32> {
        self.interrupted.borrow().clone()
    }
}

impl ProcessControl for MockProcesses {
    fn current_pid(&self) -> i32 {
        self.own_pid
    }

    fn exists(&self, pid: i32) -> bool {
        pid > 0 && self.alive.borrow().contains(&pid) && !self.foreign.borrow().contains(&pid)
    }

    fn interrupt(&self, pid: i32) -> io::Result<()> {
        self.interrupted.borrow_mut().push(pid);
        if self.refuse_signals.get() || self.foreign.borrow().contains(&pid) {
            return Err(io::Error::from_raw_os_error(libc::EPERM));
        }
        if !self.exists(pid) {
            return Err(io::Error::from_raw_os_error(libc::ESRCH));
        }
        Ok(())
    }
}
