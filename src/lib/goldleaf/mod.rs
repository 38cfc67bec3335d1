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

//! The Goldleaf command protocol: the peer sends one command frame at a time, the host answers
//! each with exactly one response frame.

pub mod structures;
mod commands;

pub use self::structures::{CommandId, PathKind, ResultCode, INPUT_MAGIC, OUTPUT_MAGIC};

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use log::{debug, info, warn};
use super::codec::BlockStream;
use super::error::Error;
use super::io::{hex_preview, Timeout, Transport};
use super::session::Session;

/// Why a handler did not succeed.
#[derive(Debug)]
pub enum Failure {
	/// Reported to the peer as this result code; the session carries on.
	Reply(ResultCode),
	/// The connection is unusable; the dispatch loop ends.
	Fatal(Error),
}

impl From<Error> for Failure {
	fn from(error: Error) -> Failure {
		if error.is_fatal() {
			return Failure::Fatal(error);
		}
		warn!("{}", error);
		match error {
			Error::UnknownDrive(_) | Error::PathNotUnderAnyDrive(_) | Error::InvalidUtf8 => Failure::Reply(ResultCode::InvalidInput),
			_ => Failure::Reply(ResultCode::ExceptionCaught),
		}
	}
}

impl From<io::Error> for Failure {
	fn from(error: io::Error) -> Failure {
		warn!("I/O error: {}", error);
		Failure::Reply(ResultCode::ExceptionCaught)
	}
}

/// A command implementation. It reads its own arguments from the stream, writes its response
/// fields into the stream's accumulator and reports how it went.
pub type Handler<T> = fn(&mut Session, &mut BlockStream<T>) -> Result<(), Failure>;

/// What one pass through the dispatcher did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Step {
	/// No frame arrived before the poll timeout.
	Idle,
	/// A frame arrived but was discarded without a response.
	Dropped,
	/// A command ran and its response was sent.
	Handled(CommandId, ResultCode),
}

pub struct Dispatcher<T: Transport> {
	stream: BlockStream<T>,
	session: Session,
	handlers: HashMap<CommandId, Handler<T>>,
	poll_timeout: Duration,
}

impl<T> Dispatcher<T> where T: Transport {
	/// `timeout` bounds writes and each idle poll for the next frame.
	pub fn new(transport: T, session: Session, timeout: Duration) -> Dispatcher<T> {
		Dispatcher {
			stream: BlockStream::new(transport, Timeout::Finite(timeout)),
			session,
			handlers: commands::table(),
			poll_timeout: timeout,
		}
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	pub fn session_mut(&mut self) -> &mut Session {
		&mut self.session
	}

	pub fn stream_mut(&mut self) -> &mut BlockStream<T> {
		&mut self.stream
	}

	/// Serves commands until interrupted or until the transport fails.
	/// Both session handles are closed on the way out.
	pub fn run(&mut self, interrupted: &AtomicBool) -> Result<(), Error> {
		let outcome = loop {
			if interrupted.load(Ordering::SeqCst) {
				info!("Interrupted, shutting down.");
				break Ok(());
			}
			if let Err(e) = self.step() {
				break Err(e);
			}
		};
		self.session.handles.close_all();
		outcome
	}

	/// Awaits one frame (for at most the poll timeout) and processes it.
	pub fn step(&mut self) -> Result<Step, Error> {
		match self.stream.begin_frame(Timeout::Finite(self.poll_timeout)) {
			Ok(()) => self.process_frame(),
			Err(Error::Timeout) => Ok(Step::Idle),
			Err(e) => Err(e),
		}
	}

	fn process_frame(&mut self) -> Result<Step, Error> {
		let magic = self.stream.read_magic()?;
		if magic != INPUT_MAGIC {
			warn!("Invalid input magic: {:?}", String::from_utf8_lossy(&magic));
			debug!("Dropped block: {}", hex_preview(self.stream.received(), 64));
			return Ok(Step::Dropped);
		}

		let raw_id = self.stream.read_u32()?;
		let (id, handler) = match CommandId::from_u32(raw_id).and_then(|id| self.handlers.get(&id).map(|h| (id, *h))) {
			Some(found) => found,
			None => {
				warn!("Unhandled command: {}", raw_id);
				return Ok(Step::Dropped);
			},
		};
		info!("Command: {:?}", id);

		self.stream.reset_output();
		let result = match handler(&mut self.session, &mut self.stream) {
			Ok(()) => ResultCode::Success,
			Err(Failure::Reply(code)) => {
				self.stream.reset_output();
				code
			},
			Err(Failure::Fatal(e)) => return Err(e),
		};
		if result != ResultCode::Success {
			warn!("An error occurred in {:?}: {:?}", id, result);
		}

		match self.stream.send(&OUTPUT_MAGIC, result as u32) {
			Ok(()) => Ok(Step::Handled(id, result)),
			Err(e) if !e.is_fatal() => {
				warn!("Could not send the {:?} response: {}", id, e);
				self.stream.send(&OUTPUT_MAGIC, ResultCode::ExceptionCaught as u32)?;
				Ok(Step::Handled(id, ResultCode::ExceptionCaught))
			},
			Err(e) => Err(e),
		}
	}
}
