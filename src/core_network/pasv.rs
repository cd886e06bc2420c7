use crate::core_reply::FtpResponse;
use crate::error::{FtpError, FtpResult};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::net::Ipv4Addr;

lazy_static! {
    static ref PASV_TUPLE: Regex =
        Regex::new(r"\((\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})\)")
            .expect("static PASV pattern");
}

/// Extracts the advertised host and data port from a 227 reply:
/// `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` gives port `p1 * 256 + p2`.
pub fn parse_pasv_reply(response: &FtpResponse) -> FtpResult<(Ipv4Addr, u16)> {
    let invalid = || FtpError::InvalidResponse {
        line: response.message().to_string(),
    };
    let caps = PASV_TUPLE.captures(response.message()).ok_or_else(invalid)?;

    let mut nums = [0u8; 6];
    for (i, slot) in nums.iter_mut().enumerate() {
        *slot = caps[i + 1].parse().map_err(|_| invalid())?;
    }

    let host = Ipv4Addr::new(nums[0], nums[1], nums[2], nums[3]);
    let port = u16::from(nums[4]) * 256 + u16::from(nums[5]);
    debug!("PASV reply advertises {}:{}", host, port);
    Ok((host, port))
}
