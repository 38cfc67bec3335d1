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

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use log::{debug, trace};
use super::{Failure, Handler};
use super::structures::{CommandId, PathKind, ResultCode};
use super::super::codec::BlockStream;
use super::super::io::Transport;
use super::super::session::{Direction, FileMode, Session};

/// The handler for every command id, assembled once per dispatcher.
pub fn table<T: Transport>() -> HashMap<CommandId, Handler<T>> {
	let mut handlers: HashMap<CommandId, Handler<T>> = HashMap::new();
	handlers.insert(CommandId::GetDriveCount, get_drive_count::<T>);
	handlers.insert(CommandId::GetDriveInfo, get_drive_info::<T>);
	handlers.insert(CommandId::StatPath, stat_path::<T>);
	handlers.insert(CommandId::GetFileCount, get_file_count::<T>);
	handlers.insert(CommandId::GetFile, get_file::<T>);
	handlers.insert(CommandId::GetDirectoryCount, get_directory_count::<T>);
	handlers.insert(CommandId::GetDirectory, get_directory::<T>);
	handlers.insert(CommandId::StartFile, start_file::<T>);
	handlers.insert(CommandId::ReadFile, read_file::<T>);
	handlers.insert(CommandId::WriteFile, write_file::<T>);
	handlers.insert(CommandId::EndFile, end_file::<T>);
	handlers.insert(CommandId::Create, create::<T>);
	handlers.insert(CommandId::Delete, delete::<T>);
	handlers.insert(CommandId::Rename, rename::<T>);
	handlers.insert(CommandId::GetSpecialPathCount, get_special_path_count::<T>);
	handlers.insert(CommandId::GetSpecialPath, get_special_path::<T>);
	handlers.insert(CommandId::SelectFile, select_file::<T>);
	handlers
}

// Handlers read every argument before acting on any of them, so a rejected argument
// never leaves the rest of the frame (or a raw payload) on the pipe.

fn resolve(session: &Session, virtual_path: &str) -> Result<PathBuf, Failure> {
	Ok(session.drives.resolve(virtual_path)?)
}

/// Names of the direct children of `directory` that are files (or directories), sorted so that
/// indices stay stable between the count and the lookups.
fn list_children(directory: &Path, kind: PathKind) -> Result<Vec<String>, Failure> {
	if !directory.is_dir() {
		debug!("{:?} is not a directory.", directory);
		return Err(Failure::Reply(ResultCode::InvalidInput));
	}
	let mut names = Vec::new();
	for entry in fs::read_dir(directory)? {
		let entry = entry?;
		// Follow symlinks, like a plain stat would
		let path = entry.path();
		let matches = match kind {
			PathKind::File => path.is_file(),
			PathKind::Directory => path.is_dir(),
			PathKind::Invalid => false,
		};
		if matches {
			names.push(entry.file_name().to_string_lossy().into_owned());
		}
	}
	names.sort();
	Ok(names)
}

fn get_drive_count<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	stream.write_u32(session.drives.len() as u32);
	Ok(())
}

fn get_drive_info<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let index = stream.read_u32()?;
	let drive = session.drives.by_index(index as usize).ok_or(Failure::Reply(ResultCode::InvalidIndex))?;

	// Label and prefix
	stream.write_string(&drive.name);
	stream.write_string(&drive.name);
	// Total and free space, not reported
	stream.write_u64(0);
	stream.write_u64(0);
	Ok(())
}

fn stat_path<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let path = resolve(session, &path)?;

	let (kind, size) = match fs::metadata(&path) {
		Ok(metadata) if metadata.is_file() => (PathKind::File, metadata.len()),
		Ok(metadata) if metadata.is_dir() => (PathKind::Directory, 0),
		Ok(_) => (PathKind::Invalid, 0),
		Err(ref e) if e.kind() == io::ErrorKind::NotFound => (PathKind::Invalid, 0),
		Err(e) => return Err(e.into()),
	};
	debug!("{:?}: {:?}, {} bytes", path, kind, size);
	stream.write_u32(kind as u32);
	stream.write_u64(size);
	Ok(())
}

fn get_file_count<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let files = list_children(&resolve(session, &path)?, PathKind::File)?;
	stream.write_u32(files.len() as u32);
	Ok(())
}

fn get_file<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let index = stream.read_u32()?;
	let files = list_children(&resolve(session, &path)?, PathKind::File)?;
	let name = files.get(index as usize).ok_or(Failure::Reply(ResultCode::InvalidIndex))?;
	stream.write_string(name);
	Ok(())
}

fn get_directory_count<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let directories = list_children(&resolve(session, &path)?, PathKind::Directory)?;
	stream.write_u32(directories.len() as u32);
	Ok(())
}

fn get_directory<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let index = stream.read_u32()?;
	let directories = list_children(&resolve(session, &path)?, PathKind::Directory)?;
	let name = directories.get(index as usize).ok_or(Failure::Reply(ResultCode::InvalidIndex))?;
	stream.write_string(name);
	Ok(())
}

fn start_file<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let mode = stream.read_u32()?;
	let mode = FileMode::from_u32(mode).ok_or(Failure::Reply(ResultCode::InvalidFileMode))?;
	let path = resolve(session, &path)?;
	session.handles.open(&path, mode)?;
	Ok(())
}

/// Reads up to `size` bytes at `offset`; fewer when the file ends first.
fn read_at(file: &mut File, offset: u64, size: u64) -> io::Result<Vec<u8>> {
	file.seek(SeekFrom::Start(offset))?;
	let mut buffer = Vec::new();
	file.take(size).read_to_end(&mut buffer)?;
	Ok(buffer)
}

fn read_file<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let offset = stream.read_u64()?;
	let size = stream.read_u64()?;
	let path = resolve(session, &path)?;

	let buffer = match session.handles.bound_to(Direction::Read, &path) {
		Some(handle) => read_at(handle.file_mut(), offset, size)?,
		None => {
			trace!("No read handle for {:?}, opening it for this read only.", path);
			read_at(&mut File::open(&path)?, offset, size)?
		},
	};
	trace!("Read {} of {} requested bytes at offset {:#X}.", buffer.len(), size, offset);
	stream.write_u64(buffer.len() as u64);
	stream.push_raw(buffer);
	Ok(())
}

fn write_file<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let size = stream.read_u64()?;

	// The payload goes straight to its file; a rejected target still has it drained
	let path = match resolve(session, &path) {
		Ok(path) => path,
		Err(failure) => {
			stream.read_raw_into(size, &mut io::sink())?;
			return Err(failure);
		},
	};
	let written = match session.handles.bound_to(Direction::Write, &path) {
		Some(handle) => stream.read_raw_into(size, handle.file_mut())?,
		None => {
			trace!("No write handle for {:?}, opening it for this write only.", path);
			match File::create(&path) {
				Ok(mut file) => stream.read_raw_into(size, &mut file)?,
				Err(e) => {
					stream.read_raw_into(size, &mut io::sink())?;
					return Err(e.into());
				},
			}
		},
	};
	stream.write_u64(written);
	Ok(())
}

fn end_file<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let mode = stream.read_u32()?;
	let mode = FileMode::from_u32(mode).ok_or(Failure::Reply(ResultCode::InvalidFileMode))?;
	if !session.handles.close(mode.direction()) {
		debug!("No {:?} handle open, nothing to close.", mode.direction());
	}
	Ok(())
}

fn create<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let kind = stream.read_u32()?;
	let path = resolve(session, &path)?;

	match PathKind::from_u32(kind) {
		Some(PathKind::File) => {
			OpenOptions::new().create(true).append(true).open(&path)?;
		},
		Some(PathKind::Directory) => fs::create_dir(&path)?,
		_ => return Err(Failure::Reply(ResultCode::InvalidInput)),
	}
	Ok(())
}

fn delete<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let path = resolve(session, &path)?;
	session.handles.release(&path);

	match fs::symlink_metadata(&path) {
		Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&path)?,
		Ok(_) => fs::remove_file(&path)?,
		Err(ref e) if e.kind() == io::ErrorKind::NotFound => debug!("{:?} does not exist, nothing to delete.", path),
		Err(e) => return Err(e.into()),
	}
	Ok(())
}

fn rename<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = stream.read_string()?;
	let new_path = stream.read_string()?;
	let path = resolve(session, &path)?;
	let new_path = resolve(session, &new_path)?;
	session.handles.release(&path);
	fs::rename(&path, &new_path)?;
	Ok(())
}

fn get_special_path_count<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	stream.write_u32(session.special_paths.len() as u32);
	Ok(())
}

fn get_special_path<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let index = stream.read_u32()?;
	let (name, path) = session.special_paths.get(index as usize).ok_or(Failure::Reply(ResultCode::InvalidIndex))?;
	let virtual_path = session.drives.unresolve(path)?;
	stream.write_string(name);
	stream.write_string(&virtual_path);
	Ok(())
}

fn select_file<T: Transport>(session: &mut Session, stream: &mut BlockStream<T>) -> Result<(), Failure> {
	let path = session.selector.select().ok_or(Failure::Reply(ResultCode::SelectionCanceled))?;
	let virtual_path = session.drives.unresolve(&path)?;
	debug!("Selected {:?} as {}", path, virtual_path);
	stream.write_string(&virtual_path);
	Ok(())
}
