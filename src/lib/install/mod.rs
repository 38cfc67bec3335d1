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

//! NSP installation over USB.
//!
//! Unlike the command protocol this is turn-taking: the host announces itself and the package,
//! the peer decides whether to install, then pulls contents and the ticket by index until it
//! says it is done. Every message is a `GLUC` frame (magic plus command id) optionally followed
//! by fields, each sent as its own transfer.

use std::io::{Read, Seek};
use log::{debug, info, trace, warn};
use super::error::Error;
use super::io::{hex_preview, Timeout, Transport};
use super::pfs0::Container;

pub const MAGIC: [u8; 4] = *b"GLUC";

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CommandId {
	ConnectionRequest = 0,
	ConnectionResponse = 1,
	NspName = 2,
	Start = 3,
	NspData = 4,
	NspContent = 5,
	NspTicket = 6,
	Finish = 7,
}

impl CommandId {
	pub fn from_u32(value: u32) -> Option<CommandId> {
		match value {
			0 => Some(CommandId::ConnectionRequest),
			1 => Some(CommandId::ConnectionResponse),
			2 => Some(CommandId::NspName),
			3 => Some(CommandId::Start),
			4 => Some(CommandId::NspData),
			5 => Some(CommandId::NspContent),
			6 => Some(CommandId::NspTicket),
			7 => Some(CommandId::Finish),
			_ => None,
		}
	}
}

/// How an installation session ended.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Outcome {
	/// The peer received what it asked for and finished.
	Completed,
	/// The peer declined the package before the transfer started.
	Declined,
}

pub struct Installer<T: Transport, TFile: Read + Seek> {
	transport: T,
	container: Container<TFile>,
	name: String,
	chunk_size: usize,
	write_timeout: Timeout,
}

impl<T, TFile> Installer<T, TFile> where T: Transport, TFile: Read + Seek {
	/// `name` is what the peer shows to the user, normally the package's file name.
	pub fn new(transport: T, container: Container<TFile>, name: String, chunk_size: usize, write_timeout: Timeout) -> Installer<T, TFile> {
		Installer { transport, container, name, chunk_size, write_timeout }
	}

	pub fn into_inner(self) -> T {
		self.transport
	}

	/// Runs the whole negotiation. A wrong magic from the peer aborts with `ProtocolViolation`.
	pub fn run(&mut self) -> Result<Outcome, Error> {
		info!("Requesting connection ...");
		self.send_command(CommandId::ConnectionRequest)?;
		self.expect(&[CommandId::ConnectionResponse])?;
		info!("Connection accepted.");

		debug!("Sending package name '{}' ...", self.name);
		self.send_command(CommandId::NspName)?;
		let name = self.name.clone();
		self.send_string(&name)?;

		info!("Waiting for the user to confirm the installation ...");
		if self.expect(&[CommandId::Start, CommandId::Finish])? == CommandId::Finish {
			info!("Installation was canceled on the console.");
			return Ok(Outcome::Declined);
		}

		self.send_manifest()?;
		loop {
			match self.receive_command()? {
				Some(CommandId::NspContent) => {
					let index = self.receive_u32()? as usize;
					self.send_content(index)?;
				},
				Some(CommandId::NspTicket) => self.send_ticket()?,
				Some(CommandId::Finish) => break,
				other => warn!("Ignoring unexpected command {:?} during the transfer.", other),
			}
		}
		info!("Installation finished.");
		Ok(Outcome::Completed)
	}

	/// Content count, then name, absolute offset and size of every entry.
	fn send_manifest(&mut self) -> Result<(), Error> {
		let entries = self.container.entries().to_vec();
		info!("Sending package contents ({} entries) ...", entries.len());
		self.send_command(CommandId::NspData)?;
		self.send_u32(entries.len() as u32)?;
		for (index, entry) in entries.iter().enumerate() {
			let offset = self.container.absolute_offset(index)?;
			debug!("Entry #{} '{}': {} bytes at {:#X}", index, entry.name, entry.size, offset);
			self.send_string(&entry.name)?;
			self.send_u64(offset)?;
			self.send_u64(entry.size)?;
		}
		Ok(())
	}

	fn send_content(&mut self, index: usize) -> Result<(), Error> {
		let entry = self.container.entry(index)?.clone();
		info!("Sending content '{}' ({} bytes) ...", entry.name, entry.size);
		let mut sent = 0u64;
		for chunk in self.container.stream_entry(index, self.chunk_size)? {
			let chunk = chunk?;
			self.transport.write(&chunk, self.write_timeout)?;
			sent += chunk.len() as u64;
			trace!("Sent {} of {} bytes of '{}'.", sent, entry.size, entry.name);
		}
		Ok(())
	}

	fn send_ticket(&mut self) -> Result<(), Error> {
		let index = self.container.find_by_extension("tik").ok_or(Error::MissingTicket)?;
		info!("Sending ticket '{}' ...", self.container.entries()[index].name);
		let ticket = self.container.read_entry(index)?;
		self.transport.write(&ticket, self.write_timeout)
	}

	fn send_command(&mut self, id: CommandId) -> Result<(), Error> {
		let mut frame = MAGIC.to_vec();
		frame.extend_from_slice(&(id as u32).to_le_bytes());
		self.transport.write(&frame, self.write_timeout)
	}

	fn send_u32(&mut self, value: u32) -> Result<(), Error> {
		self.transport.write(&value.to_le_bytes(), self.write_timeout)
	}

	fn send_u64(&mut self, value: u64) -> Result<(), Error> {
		self.transport.write(&value.to_le_bytes(), self.write_timeout)
	}

	fn send_string(&mut self, value: &str) -> Result<(), Error> {
		self.send_u32(value.len() as u32)?;
		self.transport.write(value.as_bytes(), self.write_timeout)
	}

	fn receive_u32(&mut self) -> Result<u32, Error> {
		let bytes = self.transport.read_exact(4, Timeout::Infinite)?;
		Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	/// Waits for the next frame. `None` means the id is not one this protocol defines.
	fn receive_command(&mut self) -> Result<Option<CommandId>, Error> {
		let frame = self.transport.read_exact(8, Timeout::Infinite)?;
		if frame[0..4] != MAGIC {
			return Err(Error::ProtocolViolation(format!("invalid magic in reply: {}", hex_preview(&frame[0..4], 4))));
		}
		let id = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
		trace!("Received command {}.", id);
		Ok(CommandId::from_u32(id))
	}

	fn expect(&mut self, expected: &[CommandId]) -> Result<CommandId, Error> {
		match self.receive_command()? {
			Some(id) if expected.contains(&id) => Ok(id),
			other => Err(Error::ProtocolViolation(format!("expected one of {:?}, received {:?}", expected, other))),
		}
	}
}
