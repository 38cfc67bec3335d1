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

use std::collections::VecDeque;
use super::{Timeout, Transport};
use super::super::error::Error;

/// Scripted transport: inbound transfers are queued up front, outbound transfers are recorded.
///
/// A read takes from the front transfer only (like one USB bulk transfer), splitting it when the
/// caller asks for less than it holds. When the queue is empty, finite reads report
/// `Error::Timeout` and infinite reads report `Error::Disconnected`.
#[derive(Default)]
pub struct MemoryTransport {
	inbound: VecDeque<Vec<u8>>,
	outbound: Vec<Vec<u8>>,
}

impl MemoryTransport {
	pub fn new() -> MemoryTransport {
		MemoryTransport::default()
	}

	pub fn push_inbound(&mut self, transfer: Vec<u8>) {
		self.inbound.push_back(transfer);
	}

	/// All transfers written so far, in order.
	pub fn outbound(&self) -> &[Vec<u8>] {
		&self.outbound
	}

	pub fn take_outbound(&mut self) -> Vec<Vec<u8>> {
		std::mem::replace(&mut self.outbound, Vec::new())
	}

	pub fn pending_inbound(&self) -> usize {
		self.inbound.len()
	}
}

impl Transport for MemoryTransport {
	fn read(&mut self, size: usize, timeout: Timeout) -> Result<Vec<u8>, Error> {
		match self.inbound.pop_front() {
			Some(mut transfer) => {
				if transfer.len() > size {
					let rest = transfer.split_off(size);
					self.inbound.push_front(rest);
				}
				Ok(transfer)
			},
			None => match timeout {
				Timeout::Finite(_) => Err(Error::Timeout),
				Timeout::Infinite => Err(Error::Disconnected),
			},
		}
	}

	fn write(&mut self, data: &[u8], _timeout: Timeout) -> Result<(), Error> {
		self.outbound.push(data.to_vec());
		Ok(())
	}
}
