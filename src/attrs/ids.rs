//! User and group id resolution through the system account database.

use declarative::{Error, Result};
use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::ptr;

const INITIAL_BUFFER: usize = 1024;
const MAX_BUFFER: usize = 1 << 20;

/// Resolve a user name or numeric uid string to a uid
pub fn resolve_uid(user: &str) -> Result<u32> {
    if let Ok(uid) = user.parse::<u32>() {
        return Ok(uid);
    }
    lookup_uid(user)?.ok_or_else(|| Error::UnknownUser(user.to_string()))
}

/// Resolve a group name or numeric gid string to a gid
pub fn resolve_gid(group: &str) -> Result<u32> {
    if let Ok(gid) = group.parse::<u32>() {
        return Ok(gid);
    }
    lookup_gid(group)?.ok_or_else(|| Error::UnknownGroup(group.to_string()))
}

fn lookup_uid(name: &str) -> Result<Option<u32>> {
    let c_name = CString::new(name).map_err(|_| Error::UnknownUser(name.to_string()))?;
    let mut buf: Vec<libc::c_char> = vec![0; INITIAL_BUFFER];

    loop {
        let mut pwd: MaybeUninit<libc::passwd> = MaybeUninit::uninit();
        let mut result: *mut libc::passwd = ptr::null_mut();

        // SAFETY: every pointer refers to live, correctly sized storage owned
        // by this frame; getpwnam_r writes only within `buf`.
        let rc = unsafe {
            libc::getpwnam_r(
                c_name.as_ptr(),
                pwd.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &raw mut result,
            )
        };

        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(Error::io("/etc/passwd", io::Error::from_raw_os_error(rc)));
        }
        if result.is_null() {
            return Ok(None);
        }
        // SAFETY: a non-null result points at `pwd`, initialized by the call.
        return Ok(Some(unsafe { (*result).pw_uid }));
    }
}

fn lookup_gid(name: &str) -> Result<Option<u32>> {
    let c_name = CString::new(name).map_err(|_| Error::UnknownGroup(name.to_string()))?;
    let mut buf: Vec<libc::c_char> = vec![0; INITIAL_BUFFER];

    loop {
        let mut grp: MaybeUninit<libc::group> = MaybeUninit::uninit();
        let mut result: *mut libc::group = ptr::null_mut();

        // SAFETY: as in lookup_uid.
        let rc = unsafe {
            libc::getgrnam_r(
                c_name.as_ptr(),
                grp.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &raw mut result,
            )
        };

        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(Error::io("/etc/group", io::Error::from_raw_os_error(rc)));
        }
        if result.is_null() {
            return Ok(None);
        }
        // SAFETY: a non-null result points at `grp`, initialized by the call.
        return Ok(Some(unsafe { (*result).gr_gid }));
    }
}

/// The process umask
pub fn umask() -> u32 {
    // SAFETY: umask cannot fail. The original mask is put back immediately;
    // the process is single-threaded while reconciling.
    let mask = unsafe { libc::umask(0o022) };
    unsafe { libc::umask(mask) };
    u32::from(mask)
}

/// Effective uid of this process
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}
