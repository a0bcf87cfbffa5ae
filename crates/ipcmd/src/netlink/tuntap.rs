//! TUN/TAP devices through `/dev/net/tun` and sysfs.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::debug;

use crate::gateway::GatewayResult;
use crate::types::tuntap::tun_flags;
use crate::types::{Tuntap, TuntapMode};

const TUN_DEVICE: &str = "/dev/net/tun";
const SYS_CLASS_NET: &str = "/sys/class/net";

const TUNSETIFF: libc::c_ulong = 0x4004_54ca;
const TUNSETPERSIST: libc::c_ulong = 0x4004_54cb;
const TUNSETOWNER: libc::c_ulong = 0x4004_54cc;
const TUNSETGROUP: libc::c_ulong = 0x4004_54ce;

const IFF_PERSIST: u16 = 0x0800;
const IFNAMSIZ: usize = 16;

/// `struct ifreq` with the flags member of the union.
#[repr(C)]
struct IfReq {
    name: [u8; IFNAMSIZ],
    flags: u16,
    _pad: [u8; 22],
}

impl IfReq {
    fn new(name: &str, flags: u16) -> io::Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() >= IFNAMSIZ {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("device name too long: {name}"),
            ));
        }
        let mut req = Self {
            name: [0; IFNAMSIZ],
            flags,
            _pad: [0; 22],
        };
        req.name[..bytes.len()].copy_from_slice(bytes);
        Ok(req)
    }

    fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(IFNAMSIZ);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

fn ioctl_ptr(file: &File, request: libc::c_ulong, req: &mut IfReq) -> io::Result<()> {
    // SAFETY: req is a live, correctly sized ifreq.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), request as _, req as *mut IfReq) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn ioctl_value(file: &File, request: libc::c_ulong, value: libc::c_ulong) -> io::Result<()> {
    // SAFETY: these requests take their argument by value.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), request as _, value) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn open_tun() -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(TUN_DEVICE)
}

/// Create a persistent device, returning the name the kernel gave it.
pub fn create(dev: &Tuntap) -> GatewayResult<String> {
    let file = open_tun()?;
    let mut req = IfReq::new(&dev.name, dev.mode.flag() | dev.flags)?;
    ioctl_ptr(&file, TUNSETIFF, &mut req)?;
    if let Some(uid) = dev.owner {
        ioctl_value(&file, TUNSETOWNER, libc::c_ulong::from(uid))?;
    }
    if let Some(gid) = dev.group {
        ioctl_value(&file, TUNSETGROUP, libc::c_ulong::from(gid))?;
    }
    ioctl_value(&file, TUNSETPERSIST, 1)?;
    let name = req.name();
    debug!(name = %name, mode = dev.mode.name(), "tuntap created");
    Ok(name)
}

/// Drop the persist flag so the device goes away with the last descriptor.
pub fn remove(dev: &Tuntap) -> GatewayResult<()> {
    // Attaching with the wrong type fails, so prefer what sysfs says.
    let mode = read_flags(&Path::new(SYS_CLASS_NET).join(&dev.name))
        .map(mode_of)
        .unwrap_or(dev.mode);
    let file = open_tun()?;
    let mut req = IfReq::new(&dev.name, mode.flag() | (dev.flags & tun_flags::MULTI_QUEUE))?;
    ioctl_ptr(&file, TUNSETIFF, &mut req)?;
    ioctl_value(&file, TUNSETPERSIST, 0)?;
    debug!(name = %dev.name, "tuntap removed");
    Ok(())
}

fn mode_of(flags: u16) -> TuntapMode {
    if flags & tun_flags::TAP != 0 {
        TuntapMode::Tap
    } else {
        TuntapMode::Tun
    }
}

fn read_flags(dir: &Path) -> Option<u16> {
    let raw = fs::read_to_string(dir.join("tun_flags")).ok()?;
    let raw = raw.trim();
    u16::from_str_radix(raw.strip_prefix("0x").unwrap_or(raw), 16).ok()
}

fn read_id(dir: &Path, file: &str) -> Option<u32> {
    let raw = fs::read_to_string(dir.join(file)).ok()?;
    // -1 means unset.
    raw.trim().parse::<i64>().ok().and_then(|v| u32::try_from(v).ok())
}

/// Parse one `/sys/class/net/<name>` directory; `None` if it is not a tun device.
pub fn from_sysfs(dir: &Path) -> Option<Tuntap> {
    let flags = read_flags(dir)?;
    let name = dir.file_name()?.to_string_lossy().into_owned();
    Some(Tuntap {
        name,
        mode: mode_of(flags),
        flags: flags & !(tun_flags::TUN | tun_flags::TAP | IFF_PERSIST),
        owner: read_id(dir, "owner"),
        group: read_id(dir, "group"),
        non_persist: flags & IFF_PERSIST == 0,
    })
}

/// Every TUN/TAP device visible in sysfs, sorted by name.
pub fn list() -> GatewayResult<Vec<Tuntap>> {
    let mut devices: Vec<Tuntap> = fs::read_dir(SYS_CLASS_NET)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| from_sysfs(&entry.path()))
        .collect();
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}
