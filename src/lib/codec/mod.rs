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

//! Block-framed serialization over a [`Transport`].
//!
//! Inbound, the transport is treated as an endless sequence of fixed-size blocks. Typed reads
//! consume from the current block and transparently pull one more block (blocking without
//! timeout) whenever a value straddles the end of what has been received so far.
//!
//! Outbound, typed values accumulate in a buffer that is sent as exactly one zero-padded block,
//! followed by any raw payload buffers, each as its own transfer.

use std::io::Write;
use log::trace;
use super::error::Error;
use super::io::{Timeout, Transport};

pub const BLOCK_SIZE: usize = 0x1000;

/// Largest single transfer requested while receiving a raw payload.
pub const RAW_CHUNK_SIZE: usize = 0x100000;

pub struct BlockStream<T: Transport> {
	transport: T,
	block_size: usize,
	write_timeout: Timeout,
	input: Vec<u8>,
	position: usize,
	output: Vec<u8>,
	trailing: Vec<Vec<u8>>,
}

impl<T> BlockStream<T> where T: Transport {
	pub fn new(transport: T, write_timeout: Timeout) -> BlockStream<T> {
		BlockStream::with_block_size(transport, BLOCK_SIZE, write_timeout)
	}

	pub fn with_block_size(transport: T, block_size: usize, write_timeout: Timeout) -> BlockStream<T> {
		BlockStream {
			transport,
			block_size,
			write_timeout,
			input: Vec::with_capacity(block_size),
			position: 0,
			output: Vec::with_capacity(block_size),
			trailing: Vec::new(),
		}
	}

	pub fn transport_mut(&mut self) -> &mut T {
		&mut self.transport
	}

	pub fn into_inner(self) -> T {
		self.transport
	}

	/// Discards whatever is left of the previous frame and receives the first block of a new one.
	pub fn begin_frame(&mut self, timeout: Timeout) -> Result<(), Error> {
		self.input.clear();
		self.position = 0;
		let block = self.transport.read(self.block_size, timeout)?;
		trace!("[begin_frame] Received {} bytes.", block.len());
		self.input.extend_from_slice(&block);
		Ok(())
	}

	/// Bytes of the current frame received so far.
	pub fn received(&self) -> &[u8] {
		&self.input
	}

	fn take(&mut self, length: usize) -> Result<&[u8], Error> {
		while self.input.len() - self.position < length {
			let block = self.transport.read(self.block_size, Timeout::Infinite)?;
			trace!("[take] Frame continues, received {} more bytes.", block.len());
			self.input.extend_from_slice(&block);
		}
		let start = self.position;
		self.position += length;
		Ok(&self.input[start..self.position])
	}

	pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error> {
		Ok(self.take(length)?.to_vec())
	}

	pub fn read_magic(&mut self) -> Result<[u8; 4], Error> {
		let bytes = self.take(4)?;
		Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
	}

	pub fn read_u32(&mut self) -> Result<u32, Error> {
		let bytes = self.take(4)?;
		Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	pub fn read_u64(&mut self) -> Result<u64, Error> {
		let bytes = self.take(8)?;
		let mut buffer = [0; 8];
		buffer.copy_from_slice(bytes);
		Ok(u64::from_le_bytes(buffer))
	}

	/// A `u32` byte length followed by that many UTF-8 bytes.
	pub fn read_string(&mut self) -> Result<String, Error> {
		let length = self.read_u32()? as usize;
		let bytes = self.read_bytes(length)?;
		String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
	}

	/// Receives a payload sent as its own transfers after the block, bypassing the block buffer,
	/// and hands it to `sink` piece by piece. All `size` bytes are consumed even after `sink`
	/// fails; its first error is returned once the payload is drained. Returns the bytes written.
	pub fn read_raw_into<W: Write + ?Sized>(&mut self, size: u64, sink: &mut W) -> Result<u64, Error> {
		let mut remaining = size;
		let mut written = 0u64;
		let mut failure = None;
		while remaining > 0 {
			let length = remaining.min(RAW_CHUNK_SIZE as u64) as usize;
			let chunk = self.transport.read(length, Timeout::Infinite)?;
			remaining -= chunk.len() as u64;
			trace!("[read_raw_into] Received {} raw bytes, {} to go.", chunk.len(), remaining);
			if failure.is_none() {
				match sink.write_all(&chunk) {
					Ok(()) => written += chunk.len() as u64,
					Err(e) => failure = Some(e),
				}
			}
		}
		match failure {
			Some(e) => Err(Error::Io(e)),
			None => Ok(written),
		}
	}

	pub fn write_u32(&mut self, value: u32) {
		self.output.extend_from_slice(&value.to_le_bytes());
	}

	pub fn write_u64(&mut self, value: u64) {
		self.output.extend_from_slice(&value.to_le_bytes());
	}

	pub fn write_bytes(&mut self, bytes: &[u8]) {
		self.output.extend_from_slice(bytes);
	}

	pub fn write_string(&mut self, value: &str) {
		self.write_u32(value.len() as u32);
		self.write_bytes(value.as_bytes());
	}

	/// Queues a buffer that is sent verbatim after the padded block.
	pub fn push_raw(&mut self, buffer: Vec<u8>) {
		self.trailing.push(buffer);
	}

	/// Drops any response fields and raw buffers accumulated so far.
	pub fn reset_output(&mut self) {
		self.output.clear();
		self.trailing.clear();
	}

	/// Sends `magic`, `result`, the accumulated fields and zero padding as one block,
	/// then every queued raw buffer. The accumulator is empty afterwards, even on failure.
	pub fn send(&mut self, magic: &[u8; 4], result: u32) -> Result<(), Error> {
		let mut block = Vec::with_capacity(self.block_size);
		block.extend_from_slice(magic);
		block.extend_from_slice(&result.to_le_bytes());
		block.extend_from_slice(&self.output);
		let trailing = std::mem::replace(&mut self.trailing, Vec::new());
		self.output.clear();

		if block.len() > self.block_size {
			// Metadata never outgrows a block; anything that would goes out as raw data instead
			return Err(Error::ProtocolViolation(format!("response fields need {} bytes, block holds {}", block.len(), self.block_size)));
		}
		block.resize(self.block_size, 0);
		self.transport.write(&block, self.write_timeout)?;
		for buffer in trailing {
			trace!("[send] Writing {} raw bytes.", buffer.len());
			self.transport.write(&buffer, self.write_timeout)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use super::super::io::MemoryTransport;
	use std::time::Duration;

	fn stream(block_size: usize) -> BlockStream<MemoryTransport> {
		BlockStream::with_block_size(MemoryTransport::new(), block_size, Timeout::Finite(Duration::from_millis(10)))
	}

	#[test]
	fn reads_typed_values_in_order() {
		let mut stream = stream(64);
		let mut block = b"GLCI".to_vec();
		block.extend_from_slice(&3u32.to_le_bytes());
		block.extend_from_slice(&0x1122334455667788u64.to_le_bytes());
		block.extend_from_slice(&5u32.to_le_bytes());
		block.extend_from_slice(b"hello");
		block.resize(64, 0);
		stream.transport_mut().push_inbound(block);

		stream.begin_frame(Timeout::Infinite).unwrap();
		assert_eq!(&stream.read_magic().unwrap(), b"GLCI");
		assert_eq!(stream.read_u32().unwrap(), 3);
		assert_eq!(stream.read_u64().unwrap(), 0x1122334455667788);
		assert_eq!(stream.read_string().unwrap(), "hello");
	}

	#[test]
	fn string_spanning_blocks_pulls_next_block() {
		let mut stream = stream(8);
		let mut first = 10u32.to_le_bytes().to_vec();
		first.extend_from_slice(b"abcd");
		stream.transport_mut().push_inbound(first);
		stream.transport_mut().push_inbound(b"efghij\0\0".to_vec());

		stream.begin_frame(Timeout::Infinite).unwrap();
		assert_eq!(stream.read_string().unwrap(), "abcdefghij");
		assert_eq!(stream.transport_mut().pending_inbound(), 0);
	}

	#[test]
	fn truncated_frame_reports_disconnect() {
		let mut stream = stream(8);
		stream.transport_mut().push_inbound(vec![1, 2]);
		stream.begin_frame(Timeout::Infinite).unwrap();
		match stream.read_u32() {
			Err(Error::Disconnected) => {},
			other => panic!("unexpected result: {:?}", other.map(|_| ())),
		}
	}

	#[test]
	fn invalid_utf8_is_rejected() {
		let mut stream = stream(16);
		let mut block = 2u32.to_le_bytes().to_vec();
		block.extend_from_slice(&[0xC3, 0x28]);
		stream.transport_mut().push_inbound(block);
		stream.begin_frame(Timeout::Infinite).unwrap();
		match stream.read_string() {
			Err(Error::InvalidUtf8) => {},
			other => panic!("unexpected result: {:?}", other.map(|_| ())),
		}
	}

	#[test]
	fn begin_frame_discards_leftover_input() {
		let mut stream = stream(8);
		stream.transport_mut().push_inbound(vec![1, 0, 0, 0, 2, 0, 0, 0]);
		stream.transport_mut().push_inbound(vec![3, 0, 0, 0, 4, 0, 0, 0]);
		stream.begin_frame(Timeout::Infinite).unwrap();
		assert_eq!(stream.read_u32().unwrap(), 1);
		stream.begin_frame(Timeout::Infinite).unwrap();
		assert_eq!(stream.read_u32().unwrap(), 3);
	}

	#[test]
	fn send_pads_block_and_appends_raw_buffers() {
		let mut stream = stream(32);
		stream.write_u64(3);
		stream.write_string("ab");
		stream.push_raw(vec![9, 9, 9]);
		stream.send(b"GLCO", 0).unwrap();

		let written = stream.transport_mut().take_outbound();
		assert_eq!(written.len(), 2);
		assert_eq!(written[0].len(), 32);
		assert_eq!(&written[0][0..4], b"GLCO");
		assert_eq!(&written[0][4..8], &[0, 0, 0, 0]);
		assert_eq!(&written[0][8..16], &3u64.to_le_bytes());
		assert_eq!(&written[0][16..20], &2u32.to_le_bytes());
		assert_eq!(&written[0][20..22], b"ab");
		assert!(written[0][22..].iter().all(|&b| b == 0));
		assert_eq!(written[1], vec![9, 9, 9]);

		// The accumulator starts over for the next response
		stream.send(b"GLCO", 0xBAF2).unwrap();
		let written = stream.transport_mut().take_outbound();
		assert_eq!(written.len(), 1);
		assert_eq!(&written[0][4..8], &0xBAF2u32.to_le_bytes());
		assert!(written[0][8..].iter().all(|&b| b == 0));
	}

	#[test]
	fn oversized_fields_are_refused() {
		let mut stream = stream(16);
		stream.write_bytes(&[1; 16]);
		assert!(stream.send(b"GLCO", 0).is_err());
		assert!(stream.transport_mut().outbound().is_empty());
		stream.send(b"GLCO", 0).unwrap();
	}

	#[test]
	fn raw_reads_bypass_block_buffer() {
		let mut stream = stream(8);
		stream.transport_mut().push_inbound(vec![5, 0, 0, 0, 0, 0, 0, 0]);
		stream.transport_mut().push_inbound(vec![1, 2, 3]);
		stream.transport_mut().push_inbound(vec![4, 5]);
		stream.begin_frame(Timeout::Infinite).unwrap();
		let size = stream.read_u64().unwrap();
		let mut payload = Vec::new();
		assert_eq!(stream.read_raw_into(size, &mut payload).unwrap(), 5);
		assert_eq!(payload, vec![1, 2, 3, 4, 5]);
	}

	struct FailingSink;

	impl Write for FailingSink {
		fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
			Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
		}

		fn flush(&mut self) -> std::io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn raw_payload_is_drained_when_sink_fails() {
		let mut stream = stream(8);
		stream.transport_mut().push_inbound(vec![1, 2, 3]);
		stream.transport_mut().push_inbound(vec![4, 5]);
		stream.transport_mut().push_inbound(vec![9, 0, 0, 0, 0, 0, 0, 0]);
		match stream.read_raw_into(5, &mut FailingSink) {
			Err(Error::Io(_)) => {},
			other => panic!("unexpected result: {:?}", other),
		}
		// The next frame starts cleanly after the payload
		stream.begin_frame(Timeout::Infinite).unwrap();
		assert_eq!(stream.read_u32().unwrap(), 9);
	}

	#[test]
	fn huge_raw_size_does_not_preallocate() {
		let mut stream = stream(8);
		stream.transport_mut().push_inbound(vec![1, 2, 3, 4]);
		let mut payload = Vec::new();
		match stream.read_raw_into(u64::MAX, &mut payload) {
			Err(Error::Disconnected) => {},
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(payload, vec![1, 2, 3, 4]);
	}
}
