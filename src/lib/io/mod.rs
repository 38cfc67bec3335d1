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

mod memory;

pub use self::memory::MemoryTransport;

use std::time::Duration;
use env_logger::Env;
use log::LevelFilter;
use super::error::Error;

/// Upper bound on what `read_exact` reserves before any data has arrived.
const MAX_PREALLOCATION: usize = 0x10000;

/// How long a transport operation may block.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Timeout {
	/// Give up with `Error::Timeout` after the given duration.
	Finite(Duration),
	/// Block until the transfer completes.
	Infinite,
}

/// A bidirectional, blocking byte pipe to the remote peer.
pub trait Transport {
	/// Receives at most `size` bytes. A single call returns whatever one transfer delivered,
	/// which is never empty on success.
	fn read(&mut self, size: usize, timeout: Timeout) -> Result<Vec<u8>, Error>;

	/// Sends the whole buffer as one transfer.
	fn write(&mut self, data: &[u8], timeout: Timeout) -> Result<(), Error>;

	/// Receives exactly `size` bytes, issuing as many transfers as needed.
	fn read_exact(&mut self, size: usize, timeout: Timeout) -> Result<Vec<u8>, Error> {
		// Sizes may come from the peer
		let mut data = Vec::with_capacity(size.min(MAX_PREALLOCATION));
		while data.len() < size {
			let chunk = self.read(size - data.len(), timeout)?;
			data.extend_from_slice(&chunk);
		}
		Ok(data)
	}
}

impl<'a, T: Transport + ?Sized> Transport for &'a mut T {
	fn read(&mut self, size: usize, timeout: Timeout) -> Result<Vec<u8>, Error> {
		(**self).read(size, timeout)
	}

	fn write(&mut self, data: &[u8], timeout: Timeout) -> Result<(), Error> {
		(**self).write(data, timeout)
	}
}

/// Maps the number of `-v` flags to a default log level.
pub fn verbosity_level(occurrences: u64) -> LevelFilter {
	match occurrences {
		0 => LevelFilter::Warn,
		1 => LevelFilter::Info,
		2 => LevelFilter::Debug,
		_ => LevelFilter::Trace,
	}
}

/// Installs the logger for the command-line tools. `RUST_LOG` takes precedence over `-v`.
pub fn init_logging(occurrences: u64) {
	let default_level = verbosity_level(occurrences);
	let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
	builder.format_timestamp_millis();
	let _ = builder.try_init();
}

/// Formats the first bytes of a buffer for debug output.
pub fn hex_preview(data: &[u8], limit: usize) -> String {
	let mut result = data.iter()
		.take(limit)
		.map(|b| format!("{:02X}", b))
		.collect::<Vec<_>>()
		.join(" ");
	if data.len() > limit {
		result.push_str(&format!(" ... ({} bytes)", data.len()));
	}
	result
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_maps_to_levels() {
		assert_eq!(verbosity_level(0), LevelFilter::Warn);
		assert_eq!(verbosity_level(1), LevelFilter::Info);
		assert_eq!(verbosity_level(2), LevelFilter::Debug);
		assert_eq!(verbosity_level(7), LevelFilter::Trace);
	}

	#[test]
	fn hex_preview_truncates() {
		assert_eq!(hex_preview(b"GLCI", 8), "47 4C 43 49");
		assert_eq!(hex_preview(&[0u8; 10], 2), "00 00 ... (10 bytes)");
	}

	#[test]
	fn read_exact_joins_short_transfers() {
		let mut transport = MemoryTransport::new();
		transport.push_inbound(vec![1, 2]);
		transport.push_inbound(vec![3, 4, 5]);
		let data = transport.read_exact(5, Timeout::Infinite).unwrap();
		assert_eq!(data, vec![1, 2, 3, 4, 5]);
	}

	#[test]
	fn read_exact_with_huge_size_fails_without_allocating_it() {
		let mut transport = MemoryTransport::new();
		transport.push_inbound(vec![1, 2]);
		match transport.read_exact(usize::MAX, Timeout::Infinite) {
			Err(Error::Disconnected) => {},
			other => panic!("unexpected result: {:?}", other),
		}
	}
}
