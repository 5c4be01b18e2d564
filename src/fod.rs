/*
 * This file is part of raphael-biometrics.
 *
 * Copyright (C) 2026 raphael-biometrics contributors
 *
 * raphael-biometrics is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * raphael-biometrics is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with raphael-biometrics. If not, see <https://www.gnu.org/licenses/>.
 */

//! Under-display sensor overlay watcher
//!
//! The panel driver exposes a one byte sysfs attribute that flips when the
//! fingerprint overlay is shown or hidden and wakes pollers with
//! `POLLERR | POLLPRI`. A worker thread blocks on it and hands each reading to
//! a dispatcher thread over a bounded channel; the dispatcher turns readings
//! into driver commands.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::constants::fod::EVENT_QUEUE_DEPTH;
use crate::constants::hal::{PARAM_NIT_FOD, PARAM_NIT_NONE};

/// Whether the overlay is currently shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FodState {
    Active,
    Inactive,
}

impl FodState {
    fn from_byte(b: u8) -> Self {
        if b == b'0' {
            FodState::Inactive
        } else {
            FodState::Active
        }
    }

    /// Parameter for the NIT extended command
    pub fn param(self) -> i32 {
        match self {
            FodState::Active => PARAM_NIT_FOD,
            FodState::Inactive => PARAM_NIT_NONE,
        }
    }
}

/// Rewind and read the single state byte.
pub fn read_fod_state<R: Read + Seek>(file: &mut R) -> io::Result<FodState> {
    file.seek(SeekFrom::Start(0))?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte)?;
    Ok(FodState::from_byte(byte[0]))
}

/// Block until the attribute signals a change.
pub fn wait_for_change(file: &File) -> io::Result<()> {
    let mut pfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLERR | libc::POLLPRI,
        revents: 0,
    };
    // SAFETY: pfd is a valid pollfd for a descriptor we keep open across the call.
    let rc = unsafe { libc::poll(&mut pfd, 1, -1) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Handles of the watcher and dispatcher threads
pub struct FodWatcher {
    watcher: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl FodWatcher {
    /// Watch `path` and call `on_change` from the dispatcher thread for every
    /// reading.
    pub fn spawn<F>(path: impl Into<PathBuf>, on_change: F) -> io::Result<Self>
    where
        F: FnMut(FodState) + Send + 'static,
    {
        Self::spawn_with(path, wait_for_change, on_change)
    }

    pub(crate) fn spawn_with<W, F>(path: impl Into<PathBuf>, wait: W, on_change: F) -> io::Result<Self>
    where
        W: FnMut(&File) -> io::Result<()> + Send + 'static,
        F: FnMut(FodState) + Send + 'static,
    {
        let path = path.into();
        let (tx, rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);

        let dispatcher = thread::Builder::new()
            .name("fod-dispatch".into())
            .spawn(move || dispatch(rx, on_change))?;
        let watcher = thread::Builder::new()
            .name("fod-watch".into())
            .spawn(move || watch(&path, wait, tx))?;

        Ok(Self { watcher, dispatcher })
    }

    /// Wait for both threads. They only stop once the attribute can't be
    /// opened or the dispatcher goes away.
    pub fn join(self) {
        if self.watcher.join().is_err() {
            error!("FOD watcher thread panicked");
        }
        if self.dispatcher.join().is_err() {
            error!("FOD dispatcher thread panicked");
        }
    }
}

fn watch<W>(path: &Path, mut wait: W, tx: SyncSender<FodState>)
where
    W: FnMut(&File) -> io::Result<()>,
{
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("failed to open {}: {}", path.display(), e);
            return;
        }
    };
    info!("Watching FOD overlay state at {}", path.display());

    loop {
        if let Err(e) = wait(&file) {
            error!("failed to poll fd: {}", e);
            continue;
        }
        // An unreadable attribute counts as hidden so the panel leaves FOD mode
        let state = read_fod_state(&mut file).unwrap_or_else(|e| {
            error!("failed to read {}: {}", path.display(), e);
            FodState::Inactive
        });
        debug!("FOD overlay {:?}", state);
        if tx.send(state).is_err() {
            debug!("FOD dispatcher gone, stopping watcher");
            return;
        }
    }
}

fn dispatch<F>(rx: Receiver<FodState>, mut on_change: F)
where
    F: FnMut(FodState),
{
    for state in rx {
        on_change(state);
    }
    debug!("FOD watcher gone, stopping dispatcher");
}
