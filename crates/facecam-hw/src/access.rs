//! Camera device access checks.
//!
//! A preview needs read+write access to the V4L2 node. Missing access is
//! reported up front with a remediation hint rather than as an open() error
//! halfway through startup.

use serde::Serialize;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Granted,
    Denied,
    Missing,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Access::Granted => "granted",
            Access::Denied => "denied",
            Access::Missing => "missing",
        };
        f.write_str(s)
    }
}

/// Check whether the current process may open `path` for capture.
pub fn check_access(path: &Path) -> Access {
    if !path.exists() {
        return Access::Missing;
    }
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return Access::Denied;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let ret = unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) };
    if ret == 0 {
        Access::Granted
    } else {
        tracing::debug!(
            path = %path.display(),
            error = %std::io::Error::last_os_error(),
            "camera access denied"
        );
        Access::Denied
    }
}

/// Human-readable next step for a non-granted access result.
pub fn remediation(path: &Path, access: Access) -> Option<String> {
    match access {
        Access::Granted => None,
        Access::Missing => Some(format!(
            "{} does not exist; run `facecam devices` to list capture devices",
            path.display()
        )),
        Access::Denied => Some(format!(
            "no permission to use {}; add your user to the `video` group \
             (sudo usermod -aG video $USER) and log in again",
            path.display()
        )),
    }
}
