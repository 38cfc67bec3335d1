/*
goldtree library & toolset
Copyright (C) 2018 Steve Muller <steve.muller@outlook.com>

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/

use std::io;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Every failure the library can produce, from the transport up to the install negotiation.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Filesystem or other local I/O failure.
	#[error("{0}")]
	Io(#[from] io::Error),
	#[error("USB transfer failed: {0}")]
	Usb(#[from] rusb::Error),
	#[error("transport timed out")]
	Timeout,
	#[error("transport disconnected")]
	Disconnected,
	#[error("no USB device found with id {vendor_id:04x}:{product_id:04x}")]
	DeviceNotFound {
		vendor_id: u16,
		product_id: u16,
	},
	#[error("unknown drive in path '{0}'")]
	UnknownDrive(String),
	#[error("{0:?} is not located under any drive")]
	PathNotUnderAnyDrive(PathBuf),
	#[error("invalid UTF-8 in string field")]
	InvalidUtf8,
	#[error("bad magic number, not a PFS0 container")]
	NotPfs0,
	#[error("malformed PFS0 container: {0}")]
	InvalidContainer(&'static str),
	#[error("entry index {index} out of range (container has {count} entries)")]
	EntryOutOfRange {
		index: usize,
		count: usize,
	},
	#[error("chunk size must be greater than zero")]
	InvalidChunkSize,
	#[error("protocol violation: {0}")]
	ProtocolViolation(String),
	#[error("the package contains no ticket (.tik) entry")]
	MissingTicket,
}

impl Error {
	/// Whether this error means the connection to the peer is gone or unusable.
	/// Everything else can be reported to the peer and the session continues.
	pub fn is_fatal(&self) -> bool {
		match self {
			Error::Usb(_) | Error::Timeout | Error::Disconnected | Error::DeviceNotFound { .. } => true,
			_ => false,
		}
	}
}
