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

use std::env;
use std::io;
use std::path::{Component, Path, PathBuf};
use log::{debug, warn};
use super::error::Error;

pub const ROOT_DRIVE: &str = "ROOT";

/// Separates the drive name from the relative path in a virtual path (`"GAMES:/a/b.nsp"`).
const DRIVE_SEPARATOR: &str = ":/";

/// User directories offered as special paths, in this order, when they exist.
const SPECIAL_DIRECTORIES: [&str; 3] = ["Desktop", "Documents", "Downloads"];

#[derive(Clone, Debug, PartialEq)]
pub struct Drive {
	pub name: String,
	pub root: PathBuf,
}

/// Ordered drive table. Order defines `GetDriveInfo` indices and the precedence of `unresolve`.
#[derive(Clone, Debug, Default)]
pub struct DriveTable {
	drives: Vec<Drive>,
}

impl DriveTable {
	/// Builds the table from the configured directories, followed by the mandatory `ROOT` drive.
	/// A file is replaced by its parent directory; each drive is named after its directory.
	pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<DriveTable, Error> {
		let mut table = DriveTable::default();
		for path in paths {
			let mut root = absolute(path.as_ref())?;
			if root.is_file() {
				root.pop();
			}
			let name = match root.file_name() {
				Some(name) => name.to_string_lossy().into_owned(),
				None => {
					warn!("Skipping {:?}: it has no directory name to use as a drive name.", root);
					continue;
				},
			};
			table.insert(name, root);
		}
		table.insert(ROOT_DRIVE.to_owned(), filesystem_root());
		Ok(table)
	}

	/// Appends a drive. Names are unique: a duplicate is skipped and `false` is returned.
	pub fn insert(&mut self, name: String, root: PathBuf) -> bool {
		if self.get(&name).is_some() {
			warn!("Drive {} is already mapped, skipping {:?}.", name, root);
			return false;
		}
		debug!("Drive {} -> {:?}", name, root);
		self.drives.push(Drive { name, root: normalize(&root) });
		true
	}

	pub fn len(&self) -> usize {
		self.drives.len()
	}

	pub fn is_empty(&self) -> bool {
		self.drives.is_empty()
	}

	pub fn get(&self, name: &str) -> Option<&Drive> {
		self.drives.iter().find(|drive| drive.name == name)
	}

	pub fn by_index(&self, index: usize) -> Option<&Drive> {
		self.drives.get(index)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Drive> {
		self.drives.iter()
	}

	/// Translates `"<drive>:/<relative>"` into a host path under that drive's root.
	pub fn resolve(&self, virtual_path: &str) -> Result<PathBuf, Error> {
		let (name, relative) = split_virtual_path(virtual_path)
			.ok_or_else(|| Error::UnknownDrive(virtual_path.to_owned()))?;
		let drive = self.get(name).ok_or_else(|| Error::UnknownDrive(virtual_path.to_owned()))?;
		let mut path = drive.root.clone();
		for segment in relative.split(|c| c == '/' || c == '\\').filter(|s| !s.is_empty()) {
			path.push(segment);
		}
		Ok(path)
	}

	/// Translates a host path back into a virtual path, using the first drive (in table order)
	/// whose root contains it.
	pub fn unresolve(&self, host_path: &Path) -> Result<String, Error> {
		let path = normalize(&absolute(host_path)?);
		for drive in &self.drives {
			if let Ok(relative) = path.strip_prefix(&drive.root) {
				let segments = relative.components()
					.map(|c| c.as_os_str().to_string_lossy().into_owned())
					.collect::<Vec<_>>();
				return Ok(format!("{}{}{}", drive.name, DRIVE_SEPARATOR, segments.join("/")));
			}
		}
		Err(Error::PathNotUnderAnyDrive(path))
	}
}

fn split_virtual_path(virtual_path: &str) -> Option<(&str, &str)> {
	let index = virtual_path.find(DRIVE_SEPARATOR)?;
	Some((&virtual_path[..index], &virtual_path[index + DRIVE_SEPARATOR.len()..]))
}

/// The root of the filesystem the current directory lives on.
fn filesystem_root() -> PathBuf {
	let mut root = PathBuf::new();
	if let Ok(current) = env::current_dir() {
		for component in current.components() {
			match component {
				Component::Prefix(_) | Component::RootDir => root.push(component.as_os_str()),
				_ => break,
			}
		}
	}
	if root.as_os_str().is_empty() {
		root.push(Component::RootDir.as_os_str());
	}
	root
}

fn absolute(path: &Path) -> Result<PathBuf, io::Error> {
	if path.is_absolute() {
		Ok(path.to_path_buf())
	}
	else {
		Ok(env::current_dir()?.join(path))
	}
}

/// Lexical normalization: drops `.` and folds `..` into its parent. Symlinks are left alone,
/// so paths that do not exist yet normalize too.
pub fn normalize(path: &Path) -> PathBuf {
	let mut result = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {},
			Component::ParentDir => {
				let at_root = result.components().last().map_or(true, |last| match last {
					Component::Prefix(_) | Component::RootDir => true,
					_ => false,
				});
				if !at_root {
					result.pop();
				}
			},
			other => result.push(other.as_os_str()),
		}
	}
	result
}

/// Well-known user directories that exist on this host, as (name, path) pairs.
#[derive(Clone, Debug, Default)]
pub struct SpecialPaths {
	paths: Vec<(String, PathBuf)>,
}

impl SpecialPaths {
	/// Looks for the usual user directories below the home directory.
	pub fn discover() -> SpecialPaths {
		match home_directory() {
			Some(home) => SpecialPaths::under(&home),
			None => {
				warn!("No home directory set, no special paths available.");
				SpecialPaths::default()
			},
		}
	}

	pub fn under(home: &Path) -> SpecialPaths {
		let paths = SPECIAL_DIRECTORIES.iter()
			.map(|name| (name.to_string(), home.join(name)))
			.filter(|(_, path)| path.is_dir())
			.collect::<Vec<_>>();
		debug!("Special paths: {:?}", paths);
		SpecialPaths { paths }
	}

	pub fn len(&self) -> usize {
		self.paths.len()
	}

	pub fn is_empty(&self) -> bool {
		self.paths.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<(&str, &Path)> {
		self.paths.get(index).map(|(name, path)| (name.as_str(), path.as_path()))
	}
}

fn home_directory() -> Option<PathBuf> {
	env::var_os("HOME")
		.or_else(|| env::var_os("USERPROFILE"))
		.filter(|home| !home.is_empty())
		.map(PathBuf::from)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	fn table() -> DriveTable {
		let mut table = DriveTable::default();
		table.insert("GAMES".to_owned(), PathBuf::from("/home/user/games"));
		table.insert(ROOT_DRIVE.to_owned(), PathBuf::from("/"));
		table
	}

	#[test]
	fn resolve_joins_relative_part_onto_root() {
		let table = table();
		assert_eq!(table.resolve("GAMES:/a.nsp").unwrap(), PathBuf::from("/home/user/games/a.nsp"));
		assert_eq!(table.resolve("ROOT:/tmp/x/y").unwrap(), PathBuf::from("/tmp/x/y"));
		assert_eq!(table.resolve("GAMES:/").unwrap(), PathBuf::from("/home/user/games"));
	}

	#[test]
	fn resolve_splits_on_first_separator_only() {
		let table = table();
		assert_eq!(table.resolve("GAMES:/odd:/name").unwrap(), PathBuf::from("/home/user/games/odd:/name"));
	}

	#[test]
	fn resolve_rejects_unknown_drives() {
		let table = table();
		match table.resolve("MUSIC:/song.mp3") {
			Err(Error::UnknownDrive(path)) => assert_eq!(path, "MUSIC:/song.mp3"),
			other => panic!("unexpected result: {:?}", other),
		}
		assert!(table.resolve("no separator").is_err());
	}

	#[test]
	fn unresolve_prefers_first_matching_drive() {
		let table = table();
		assert_eq!(table.unresolve(Path::new("/home/user/games/sub/a.nsp")).unwrap(), "GAMES:/sub/a.nsp");
		assert_eq!(table.unresolve(Path::new("/etc/hosts")).unwrap(), "ROOT:/etc/hosts");
		assert_eq!(table.unresolve(Path::new("/home/user/games")).unwrap(), "GAMES:/");
	}

	#[test]
	fn unresolve_without_covering_drive_fails() {
		let mut table = DriveTable::default();
		table.insert("GAMES".to_owned(), PathBuf::from("/home/user/games"));
		match table.unresolve(Path::new("/etc/hosts")) {
			Err(Error::PathNotUnderAnyDrive(path)) => assert_eq!(path, PathBuf::from("/etc/hosts")),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn round_trip_normalizes_relative_part() {
		let table = table();
		let cases = [
			("GAMES", "a/b/c.nsp", "a/b/c.nsp"),
			("GAMES", "a/./b//c.nsp", "a/b/c.nsp"),
			("GAMES", "a/x/../c.nsp", "a/c.nsp"),
			("ROOT", "tmp/newdir", "tmp/newdir"),
			("ROOT", "", ""),
		];
		for &(drive, relative, normalized) in cases.iter() {
			let host = table.resolve(&format!("{}:/{}", drive, relative)).unwrap();
			assert_eq!(table.unresolve(&host).unwrap(), format!("{}:/{}", drive, normalized));
		}
	}

	#[test]
	fn duplicate_names_keep_the_first_drive() {
		let mut table = table();
		assert!(!table.insert("GAMES".to_owned(), PathBuf::from("/elsewhere")));
		assert_eq!(table.len(), 2);
		assert_eq!(table.get("GAMES").unwrap().root, PathBuf::from("/home/user/games"));
	}

	#[test]
	fn from_paths_names_drives_and_appends_root() {
		let dir = tempfile::tempdir().unwrap();
		let games = dir.path().join("games");
		fs::create_dir(&games).unwrap();
		let file = games.join("title.nsp");
		fs::write(&file, b"x").unwrap();

		assert!(DriveTable::default().is_empty());
		let table = DriveTable::from_paths(&[games.clone(), file]).unwrap();
		assert!(!table.is_empty());
		let names = table.iter().map(|d| d.name.as_str()).collect::<Vec<_>>();
		assert_eq!(names, vec!["games", ROOT_DRIVE]);
		assert_eq!(table.by_index(0).unwrap().root, normalize(&games));
	}

	#[test]
	fn normalize_stays_at_root() {
		assert_eq!(normalize(Path::new("/../a/./b/..")), PathBuf::from("/a"));
	}

	#[test]
	fn special_paths_only_lists_existing_directories() {
		let home = tempfile::tempdir().unwrap();
		fs::create_dir(home.path().join("Documents")).unwrap();
		fs::write(home.path().join("Desktop"), b"not a directory").unwrap();

		let special = SpecialPaths::under(home.path());
		assert_eq!(special.len(), 1);
		let (name, path) = special.get(0).unwrap();
		assert_eq!(name, "Documents");
		assert_eq!(path, home.path().join("Documents").as_path());
		assert!(special.get(1).is_none());

		let bare = tempfile::tempdir().unwrap();
		assert!(SpecialPaths::under(bare.path()).is_empty());
	}
}
