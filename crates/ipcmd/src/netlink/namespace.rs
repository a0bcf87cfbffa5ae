//! Network namespace handles.
//!
//! `setns` only moves the calling thread, so work that must happen inside
//! a namespace runs synchronously between the switch and the switch back.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use tracing::warn;

use crate::error::GatewayError;
use crate::gateway::GatewayResult;

/// Where named namespaces are bind-mounted.
pub const NETNS_RUN_DIR: &str = "/var/run/netns";

/// An open namespace file.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    file: File,
}

impl Namespace {
    /// Open the named namespace under [`NETNS_RUN_DIR`].
    pub fn open(name: &str) -> GatewayResult<Self> {
        let path = PathBuf::from(NETNS_RUN_DIR).join(name);
        let file = File::open(&path).map_err(|e| GatewayError::Namespace {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            file,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Run `f` with the current thread inside this namespace.
    pub fn enter<T>(&self, f: impl FnOnce() -> GatewayResult<T>) -> GatewayResult<T> {
        let current = File::open("/proc/self/ns/net")?;
        setns(&self.file).map_err(|e| GatewayError::Namespace {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        let result = f();
        if let Err(e) = setns(&current) {
            warn!("failed to restore original network namespace: {e}");
        }
        result
    }
}

fn setns(file: &File) -> io::Result<()> {
    // SAFETY: the descriptor belongs to an open namespace file.
    let ret = unsafe { libc::setns(file.as_raw_fd(), libc::CLONE_NEWNET) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Run `f` inside `ns` when given, else in place.
pub fn within<T>(ns: Option<&Namespace>, f: impl FnOnce() -> GatewayResult<T>) -> GatewayResult<T> {
    match ns {
        Some(ns) => ns.enter(f),
        None => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_namespace() {
        let err = Namespace::open("ipcmd-no-such-namespace").unwrap_err();
        assert!(
            err.to_string()
                .starts_with("failed to find network namespace \"ipcmd-no-such-namespace\": "),
            "{err}"
        );
    }

    #[test]
    fn test_within_without_namespace() {
        assert_eq!(within(None, || Ok(7)).unwrap(), 7);
    }
}
