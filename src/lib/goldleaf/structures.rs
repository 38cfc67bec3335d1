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

// Wire constants of the Goldleaf command protocol.

pub const INPUT_MAGIC: [u8; 4] = *b"GLCI";
pub const OUTPUT_MAGIC: [u8; 4] = *b"GLCO";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
	GetDriveCount = 1,
	GetDriveInfo = 2,
	StatPath = 3,
	GetFileCount = 4,
	GetFile = 5,
	GetDirectoryCount = 6,
	GetDirectory = 7,
	StartFile = 8,
	ReadFile = 9,
	WriteFile = 10,
	EndFile = 11,
	Create = 12,
	Delete = 13,
	Rename = 14,
	GetSpecialPathCount = 15,
	GetSpecialPath = 16,
	SelectFile = 17,
}

impl CommandId {
	pub const ALL: [CommandId; 17] = [
		CommandId::GetDriveCount,
		CommandId::GetDriveInfo,
		CommandId::StatPath,
		CommandId::GetFileCount,
		CommandId::GetFile,
		CommandId::GetDirectoryCount,
		CommandId::GetDirectory,
		CommandId::StartFile,
		CommandId::ReadFile,
		CommandId::WriteFile,
		CommandId::EndFile,
		CommandId::Create,
		CommandId::Delete,
		CommandId::Rename,
		CommandId::GetSpecialPathCount,
		CommandId::GetSpecialPath,
		CommandId::SelectFile,
	];

	pub fn from_u32(value: u32) -> Option<CommandId> {
		CommandId::ALL.iter().cloned().find(|id| *id as u32 == value)
	}
}

/// Result code sent in every response. Values are fixed for this wire format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResultCode {
	Success = 0x0000,
	ExceptionCaught = 0xBAF1,
	InvalidIndex = 0xBAF2,
	InvalidFileMode = 0xBAF3,
	SelectionCanceled = 0xBAF4,
	InvalidInput = 0xBAF5,
}

/// What a path points to, as reported by `StatPath` and requested by `Create`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathKind {
	Invalid = 0,
	File = 1,
	Directory = 2,
}

impl PathKind {
	pub fn from_u32(value: u32) -> Option<PathKind> {
		match value {
			0 => Some(PathKind::Invalid),
			1 => Some(PathKind::File),
			2 => Some(PathKind::Directory),
			_ => None,
		}
	}
}
