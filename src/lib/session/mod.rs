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

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use log::debug;
use super::drive::{DriveTable, SpecialPaths};

/// How a session file handle was opened.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FileMode {
	Read,
	Write,
	Append,
}

impl FileMode {
	pub fn from_u32(value: u32) -> Option<FileMode> {
		match value {
			1 => Some(FileMode::Read),
			2 => Some(FileMode::Write),
			3 => Some(FileMode::Append),
			_ => None,
		}
	}

	pub fn direction(self) -> Direction {
		match self {
			FileMode::Read => Direction::Read,
			FileMode::Write | FileMode::Append => Direction::Write,
		}
	}

	fn open(self, path: &Path) -> io::Result<File> {
		match self {
			FileMode::Read => File::open(path),
			FileMode::Write => File::create(path),
			FileMode::Append => OpenOptions::new().create(true).append(true).open(path),
		}
	}
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Direction {
	Read,
	Write,
}

/// An open file bound to the host path it was opened for.
pub struct FileHandle {
	mode: FileMode,
	path: PathBuf,
	file: File,
}

impl FileHandle {
	pub fn mode(&self) -> FileMode {
		self.mode
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn file_mut(&mut self) -> &mut File {
		&mut self.file
	}
}

/// The session's two handle slots. The read slot is either closed or `Read`; the write slot is
/// either closed, `Write` or `Append`. Files close when they leave their slot, including when the
/// session is dropped.
#[derive(Default)]
pub struct FileHandles {
	read: Option<FileHandle>,
	write: Option<FileHandle>,
}

impl FileHandles {
	fn slot(&mut self, direction: Direction) -> &mut Option<FileHandle> {
		match direction {
			Direction::Read => &mut self.read,
			Direction::Write => &mut self.write,
		}
	}

	/// Opens `path` in `mode`. The handle previously held in that direction is closed first,
	/// so a failed open leaves the slot closed.
	pub fn open(&mut self, path: &Path, mode: FileMode) -> io::Result<()> {
		let slot = self.slot(mode.direction());
		if let Some(previous) = slot.take() {
			debug!("Closing {:?} handle for {:?}.", previous.mode, previous.path);
		}
		let file = mode.open(path)?;
		debug!("Opened {:?} handle for {:?}.", mode, path);
		*slot = Some(FileHandle { mode, path: path.to_path_buf(), file });
		Ok(())
	}

	/// Closes the handle of the given direction. Returns whether one was open.
	pub fn close(&mut self, direction: Direction) -> bool {
		match self.slot(direction).take() {
			Some(handle) => {
				debug!("Closed {:?} handle for {:?}.", handle.mode, handle.path);
				true
			},
			None => false,
		}
	}

	pub fn close_all(&mut self) {
		self.close(Direction::Read);
		self.close(Direction::Write);
	}

	/// Closes any handle bound to `path` or to something below it.
	pub fn release(&mut self, path: &Path) {
		for direction in [Direction::Read, Direction::Write].iter() {
			let bound = self.slot(*direction).as_ref().map_or(false, |handle| handle.path.starts_with(path));
			if bound {
				self.close(*direction);
			}
		}
	}

	pub fn get(&self, direction: Direction) -> Option<&FileHandle> {
		match direction {
			Direction::Read => self.read.as_ref(),
			Direction::Write => self.write.as_ref(),
		}
	}

	/// The open handle of that direction, if it is bound to `path`.
	pub fn bound_to(&mut self, direction: Direction, path: &Path) -> Option<&mut FileHandle> {
		self.slot(direction).as_mut().filter(|handle| handle.path == path)
	}

	pub fn is_open(&self, direction: Direction) -> bool {
		self.get(direction).is_some()
	}
}

/// Answers `SelectFile`: a host file chosen for the peer, or `None` when the choice was canceled.
pub trait FileSelector {
	fn select(&mut self) -> Option<PathBuf>;
}

/// Always answers with the file given on the command line.
pub struct Preselected(pub PathBuf);

impl FileSelector for Preselected {
	fn select(&mut self) -> Option<PathBuf> {
		Some(self.0.clone())
	}
}

// Ctrl-C does not interrupt a pending line read; it stops the whole server once the read returns
const PROMPT: &str = "Select file (leave empty to cancel, Ctrl-C stops the server): ";

/// Asks the operator on the terminal. An empty answer or end of input cancels.
pub struct Prompt<R: BufRead, W: Write> {
	input: R,
	output: W,
}

impl<R, W> Prompt<R, W> where R: BufRead, W: Write {
	pub fn new(input: R, output: W) -> Prompt<R, W> {
		Prompt { input, output }
	}
}

impl<R, W> FileSelector for Prompt<R, W> where R: BufRead, W: Write {
	fn select(&mut self) -> Option<PathBuf> {
		let _ = write!(self.output, "\n{}", PROMPT);
		let _ = self.output.flush();
		let mut line = String::new();
		let read = self.input.read_line(&mut line).unwrap_or(0);
		let _ = writeln!(self.output);
		let answer = line.trim();
		if read == 0 || answer.is_empty() {
			None
		}
		else {
			Some(PathBuf::from(answer))
		}
	}
}

/// Everything one connection owns: the drive table, the special paths, the file handles and
/// the source of `SelectFile` answers.
pub struct Session {
	pub drives: DriveTable,
	pub special_paths: SpecialPaths,
	pub handles: FileHandles,
	pub selector: Box<dyn FileSelector>,
}

impl Session {
	pub fn new(drives: DriveTable, special_paths: SpecialPaths, selector: Box<dyn FileSelector>) -> Session {
		Session { drives, special_paths, handles: FileHandles::default(), selector }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use std::io::{Cursor, Read};

	#[test]
	fn file_modes_from_wire_values() {
		assert_eq!(FileMode::from_u32(1), Some(FileMode::Read));
		assert_eq!(FileMode::from_u32(2), Some(FileMode::Write));
		assert_eq!(FileMode::from_u32(3), Some(FileMode::Append));
		assert_eq!(FileMode::from_u32(0), None);
		assert_eq!(FileMode::from_u32(4), None);
	}

	#[test]
	fn opening_replaces_handle_of_same_direction_only() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a");
		let b = dir.path().join("b");
		fs::write(&a, b"aaa").unwrap();
		fs::write(&b, b"bbb").unwrap();

		let mut handles = FileHandles::default();
		handles.open(&a, FileMode::Read).unwrap();
		handles.open(&dir.path().join("out"), FileMode::Write).unwrap();
		handles.open(&b, FileMode::Read).unwrap();

		assert_eq!(handles.get(Direction::Read).unwrap().path(), b.as_path());
		assert_eq!(handles.get(Direction::Write).unwrap().mode(), FileMode::Write);
		assert!(handles.bound_to(Direction::Read, &a).is_none());

		let mut contents = String::new();
		handles.bound_to(Direction::Read, &b).unwrap().file_mut().read_to_string(&mut contents).unwrap();
		assert_eq!(contents, "bbb");
	}

	#[test]
	fn failed_open_leaves_slot_closed() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a");
		fs::write(&a, b"aaa").unwrap();

		let mut handles = FileHandles::default();
		handles.open(&a, FileMode::Read).unwrap();
		assert!(handles.open(&dir.path().join("missing"), FileMode::Read).is_err());
		assert!(!handles.is_open(Direction::Read));
	}

	#[test]
	fn closing_twice_is_harmless() {
		let dir = tempfile::tempdir().unwrap();
		let mut handles = FileHandles::default();
		handles.open(&dir.path().join("log"), FileMode::Append).unwrap();
		assert!(handles.close(Direction::Write));
		assert!(!handles.close(Direction::Write));
	}

	#[test]
	fn release_closes_handles_below_path() {
		let dir = tempfile::tempdir().unwrap();
		let sub = dir.path().join("sub");
		fs::create_dir(&sub).unwrap();
		let mut handles = FileHandles::default();
		handles.open(&sub.join("f"), FileMode::Write).unwrap();
		handles.open(&sub.join("f"), FileMode::Read).unwrap();
		handles.release(&sub);
		assert!(!handles.is_open(Direction::Read));
		assert!(!handles.is_open(Direction::Write));
	}

	#[test]
	fn prompt_returns_answer_or_cancels() {
		let mut output = Vec::new();
		let chosen = Prompt::new(Cursor::new("/tmp/file.nsp\n"), &mut output).select();
		assert_eq!(chosen, Some(PathBuf::from("/tmp/file.nsp")));

		let mut output = Vec::new();
		assert_eq!(Prompt::new(Cursor::new("\n"), &mut output).select(), None);
		let mut output = Vec::new();
		assert_eq!(Prompt::new(Cursor::new(""), &mut output).select(), None);
	}

	#[test]
	fn prompt_explains_cancel_and_interrupt() {
		let mut output = Vec::new();
		Prompt::new(Cursor::new("\n"), &mut output).select();
		let text = String::from_utf8(output).unwrap();
		assert!(text.contains("leave empty to cancel"));
		assert!(text.contains("Ctrl-C stops the server"));
	}
}
