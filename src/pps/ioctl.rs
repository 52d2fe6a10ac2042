//! Linux RFC 2783 PPS ioctls from `linux/pps.h`.

#![allow(non_camel_case_types)]

use libc::c_int;

use std::mem;

#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct data {
    pub info: info,
    pub timeout: time,
}

#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct info {
    pub assert_sequence: u32,
    pub clear_sequence: u32,
    pub assert_tu: time,
    pub clear_tu: time,
    pub current_mode: i32,
}

#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct params {
    pub api_version: i32,
    pub mode: i32,
    pub assert_off_tu: time,
    pub clear_off_tu: time,
}

#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct time {
    pub sec: i64,
    pub nsec: i32,
    pub flags: u32,
}

pub const TIME_INVALID: u32 = 1 << 0;

pub const CAPTUREASSERT: i32 = 0x01;
pub const CANWAIT: i32 = 0x100;

pub const MAGIC: u8 = b'p';

pub const GETPARAMS: u8 = 0xa1;
pub const SETPARAMS: u8 = 0xa2;
pub const GETCAP: u8 = 0xa3;
pub const FETCH: u8 = 0xa4;

// the kernel encodes the size of a pointer, not of the struct, in these requests

pub unsafe fn getparams(fd: c_int, data: *mut params) -> nix::Result<c_int> {
    let res = libc::ioctl(
        fd,
        request_code_read!(MAGIC, GETPARAMS, mem::size_of::<*mut params>()),
        data,
    );
    nix::errno::Errno::result(res)
}

pub unsafe fn setparams(fd: c_int, data: *mut params) -> nix::Result<c_int> {
    let res = libc::ioctl(
        fd,
        request_code_write!(MAGIC, SETPARAMS, mem::size_of::<*mut params>()),
        data,
    );
    nix::errno::Errno::result(res)
}

ioctl_read!(getcap, MAGIC, GETCAP, i32);

pub unsafe fn fetch(fd: c_int, data: *mut data) -> nix::Result<c_int> {
    let res = libc::ioctl(
        fd,
        request_code_readwrite!(MAGIC, FETCH, mem::size_of::<*mut data>()),
        data,
    );
    nix::errno::Errno::result(res)
}
