//! Mach-O binary reader and editor.
//!
//! A from-scratch, bytes-in/bytes-out parser, since the in-place edits
//! this crate needs — rewriting a dylib's recorded install path,
//! appending an `LC_RPATH`, correcting a segment's recorded file size
//! after appending data past the link edit — need a load-command-patching
//! API no off-the-shelf reader provides. Follows an
//! immutable-parse-tree-plus-pending-edits design: [`parse`] never
//! mutates its input; [`MachO::apply_edit`] returns a fresh byte buffer.

use crate::error::{Error, Result};

/// Mach-O 32-bit little-endian magic.
pub const MAGIC_32_LE: u32 = 0xfeed_face;
/// Mach-O 64-bit little-endian magic.
pub const MAGIC_64_LE: u32 = 0xfeed_facf;
/// Mach-O 32-bit big-endian magic.
pub const MAGIC_32_BE: u32 = 0xcefa_edfe;
/// Mach-O 64-bit big-endian magic.
pub const MAGIC_64_BE: u32 = 0xcffa_edfe;
/// Universal (fat) binary magic, big-endian on disk.
pub const MAGIC_FAT: u32 = 0xcafe_babe;

const LC_SEGMENT: u32 = 0x1;
const LC_SEGMENT_64: u32 = 0x19;
const LC_LOAD_DYLIB: u32 = 0xc;
const LC_ID_DYLIB: u32 = 0xd;
const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | 0x8000_0000;
const LC_RPATH: u32 = 0x1c | 0x8000_0000;
const LC_REEXPORT_DYLIB: u32 = 0x1f | 0x8000_0000;

/// Parsed Mach-O header fields, endian- and word-size-normalized.
#[derive(Debug, Clone, Copy)]
pub struct MachHeader {
    /// Raw magic number, identifying word size and byte order.
    pub magic: u32,
    /// CPU type (`CPU_TYPE_X86_64`, `CPU_TYPE_ARM64`, ...).
    pub cputype: i32,
    /// CPU subtype.
    pub cpusubtype: i32,
    /// Mach-O file type (`MH_EXECUTE`, `MH_DYLIB`, ...).
    pub filetype: u32,
    /// Number of load commands.
    pub ncmds: u32,
    /// Total size in bytes of all load commands.
    pub sizeofcmds: u32,
    /// Header flags.
    pub flags: u32,
    /// `true` for LP64 (`MAGIC_64_*`).
    pub is_64: bool,
    /// `true` for big-endian byte order on disk.
    pub is_big_endian: bool,
}

impl MachHeader {
    fn header_size(self) -> usize {
        if self.is_64 { 32 } else { 28 }
    }
}

/// One load command, kept as an opaque byte span plus its parsed `cmd`
/// type, so commands this crate doesn't specifically understand still
/// round-trip unchanged.
#[derive(Debug, Clone)]
pub struct LoadCommand {
    /// `LC_*` constant.
    pub cmd: u32,
    /// Byte offset of this command within the file.
    pub offset: usize,
    /// Raw bytes of the command, including its 8-byte `cmd`/`cmdsize`
    /// header.
    pub bytes: Vec<u8>,
}

impl LoadCommand {
    fn cmdsize(&self) -> u32 {
        self.bytes.len() as u32
    }
}

/// A single non-fat Mach-O image: header, load commands, and the full raw
/// bytes it was parsed from.
#[derive(Debug, Clone)]
pub struct MachO {
    /// Parsed header.
    pub header: MachHeader,
    /// Load commands, in file order.
    pub load_commands: Vec<LoadCommand>,
    /// The complete original byte buffer this was parsed from.
    pub raw: Vec<u8>,
}

/// One architecture slice within a [`Universal`] (fat) binary.
#[derive(Debug, Clone)]
pub struct FatArch {
    /// CPU type of this slice.
    pub cputype: i32,
    /// CPU subtype of this slice.
    pub cpusubtype: i32,
    /// Byte offset of this slice within the fat file.
    pub offset: u32,
    /// Byte size of this slice.
    pub size: u32,
    /// The parsed slice itself.
    pub macho: MachO,
}

/// A universal (fat) binary containing one [`MachO`] per architecture.
#[derive(Debug, Clone)]
pub struct Universal {
    /// Each architecture's slice.
    pub arches: Vec<FatArch>,
}

/// The result of [`parse`]: either a single-architecture Mach-O or a
/// universal binary with one slice per architecture.
#[derive(Debug, Clone)]
pub enum Parsed {
    /// A single-architecture image.
    Single(MachO),
    /// A fat/universal image.
    Fat(Universal),
}

fn read_u32(bytes: &[u8], offset: usize, big_endian: bool) -> Result<u32> {
    let slice: [u8; 4] = bytes
        .get(offset..offset + 4)
        .ok_or_else(|| Error::Other("unexpected end of Mach-O data".into()))?
        .try_into()
        .unwrap();
    Ok(if big_endian {
        u32::from_be_bytes(slice)
    } else {
        u32::from_le_bytes(slice)
    })
}

fn read_i32(bytes: &[u8], offset: usize, big_endian: bool) -> Result<i32> {
    Ok(read_u32(bytes, offset, big_endian)? as i32)
}

/// Parse a Mach-O or universal binary from `data`.
pub fn parse(data: &[u8]) -> Result<Parsed> {
    if data.len() < 4 {
        return Err(Error::Other("file too small to be Mach-O".into()));
    }
    let magic_be = u32::from_be_bytes(data[0..4].try_into().unwrap());
    if magic_be == MAGIC_FAT {
        return Ok(Parsed::Fat(parse_fat(data)?));
    }
    Ok(Parsed::Single(parse_single(data, 0)?))
}

fn parse_fat(data: &[u8]) -> Result<Universal> {
    let nfat = read_u32(data, 4, true)?;
    let mut arches = Vec::with_capacity(nfat as usize);
    for i in 0..nfat {
        let entry_offset = 8 + (i as usize) * 20;
        let cputype = read_i32(data, entry_offset, true)?;
        let cpusubtype = read_i32(data, entry_offset + 4, true)?;
        let offset = read_u32(data, entry_offset + 8, true)?;
        let size = read_u32(data, entry_offset + 12, true)?;
        let slice_data = data
            .get(offset as usize..(offset + size) as usize)
            .ok_or_else(|| Error::Other("fat arch slice out of bounds".into()))?;
        let macho = parse_single(slice_data, 0)?;
        arches.push(FatArch {
            cputype,
            cpusubtype,
            offset,
            size,
            macho,
        });
    }
    Ok(Universal { arches })
}

fn parse_single(data: &[u8], base: usize) -> Result<MachO> {
    let magic = u32::from_be_bytes(
        data.get(base..base + 4)
            .ok_or_else(|| Error::Other("truncated Mach-O header".into()))?
            .try_into()
            .unwrap(),
    );
    let (is_64, is_big_endian) = match magic {
        m if m == MAGIC_32_LE.swap_bytes() => (false, false),
        m if m == MAGIC_64_LE.swap_bytes() => (true, false),
        m if m == MAGIC_32_BE => (false, true),
        m if m == MAGIC_64_BE => (true, true),
        m if m == MAGIC_32_LE => (false, false),
        m if m == MAGIC_64_LE => (true, false),
        _ => return Err(Error::Other(format!("unrecognized Mach-O magic {magic:#x}"))),
    };
    let magic_native = read_u32(data, base, is_big_endian)?;
    let header = MachHeader {
        magic: magic_native,
        cputype: read_i32(data, base + 4, is_big_endian)?,
        cpusubtype: read_i32(data, base + 8, is_big_endian)?,
        filetype: read_u32(data, base + 12, is_big_endian)?,
        ncmds: read_u32(data, base + 16, is_big_endian)?,
        sizeofcmds: read_u32(data, base + 20, is_big_endian)?,
        flags: read_u32(data, base + 24, is_big_endian)?,
        is_64,
        is_big_endian,
    };

    let mut load_commands = Vec::with_capacity(header.ncmds as usize);
    let mut cursor = base + header.header_size();
    for _ in 0..header.ncmds {
        let cmd = read_u32(data, cursor, header.is_big_endian)?;
        let cmdsize = read_u32(data, cursor + 4, header.is_big_endian)?;
        if cmdsize < 8 {
            return Err(Error::Other("load command smaller than its header".into()));
        }
        let bytes = data
            .get(cursor..cursor + cmdsize as usize)
            .ok_or_else(|| Error::Other("load command runs past end of file".into()))?
            .to_vec();
        load_commands.push(LoadCommand {
            cmd,
            offset: cursor,
            bytes,
        });
        cursor += cmdsize as usize;
    }

    Ok(MachO {
        header,
        load_commands,
        raw: data.to_vec(),
    })
}

/// A single, composable edit to apply to a [`MachO`].
#[derive(Debug, Clone)]
pub enum Edit {
    /// Rewrite the install-name/load/weak/reexport path string embedded in
    /// the load command at `command_index` to `new_path`. The command's
    /// `cmdsize` must have enough room (callers should round the command
    /// up when originally writing it); this never changes file layout.
    RewriteDylibPath {
        /// Index into [`MachO::load_commands`].
        command_index: usize,
        /// Replacement path, must fit within the existing command's
        /// trailing padding.
        new_path: String,
    },
    /// Correct the recorded file size of segment `segment_name` (as found
    /// in an `LC_SEGMENT_64` command) after data has been appended past
    /// the original end of file.
    UpdateSegmentFileSize {
        /// Sixteen-byte, NUL-padded segment name, e.g. `"__LINKEDIT"`.
        segment_name: [u8; 16],
        /// New file size in bytes.
        new_file_size: u64,
    },
}

impl MachO {
    /// Return the dylib path strings referenced by `LC_LOAD_DYLIB`,
    /// `LC_LOAD_WEAK_DYLIB`, and `LC_REEXPORT_DYLIB` commands (not
    /// `LC_ID_DYLIB`, which records this binary's own identity, not a
    /// dependency).
    pub fn dependency_paths(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for command in &self.load_commands {
            if matches!(command.cmd, LC_LOAD_DYLIB | LC_LOAD_WEAK_DYLIB | LC_REEXPORT_DYLIB) {
                out.push(self.dylib_command_path(command)?);
            }
        }
        Ok(out)
    }

    /// The path recorded by this binary's own `LC_ID_DYLIB`, if it is a
    /// dylib.
    pub fn own_identity_path(&self) -> Result<Option<String>> {
        for command in &self.load_commands {
            if command.cmd == LC_ID_DYLIB {
                return Ok(Some(self.dylib_command_path(command)?));
            }
        }
        Ok(None)
    }

    fn dylib_command_path(&self, command: &LoadCommand) -> Result<String> {
        let name_offset = read_u32(&command.bytes, 8, self.header.is_big_endian)? as usize;
        let bytes = command
            .bytes
            .get(name_offset..)
            .ok_or_else(|| Error::Other("dylib name offset out of range".into()))?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        std::str::from_utf8(&bytes[..end])
            .map(str::to_string)
            .map_err(|_| Error::Other("dylib path is not valid UTF-8".into()))
    }

    /// Apply `edits` in order, returning a new byte buffer. The header's
    /// `ncmds`/`sizeofcmds` are left unchanged since every supported edit
    /// preserves command count and size.
    pub fn apply_edit(&self, edits: &[Edit]) -> Result<Vec<u8>> {
        let mut out = self.raw.clone();
        for edit in edits {
            match edit {
                Edit::RewriteDylibPath {
                    command_index,
                    new_path,
                } => self.rewrite_dylib_path(&mut out, *command_index, new_path)?,
                Edit::UpdateSegmentFileSize {
                    segment_name,
                    new_file_size,
                } => self.update_segment_file_size(&mut out, *segment_name, *new_file_size)?,
            }
        }
        Ok(out)
    }

    fn rewrite_dylib_path(
        &self,
        out: &mut [u8],
        command_index: usize,
        new_path: &str,
    ) -> Result<()> {
        let command = self
            .load_commands
            .get(command_index)
            .ok_or_else(|| Error::Other("load command index out of range".into()))?;
        let name_offset = read_u32(&command.bytes, 8, self.header.is_big_endian)? as usize;
        let available = command.bytes.len() - name_offset;
        let new_bytes = new_path.as_bytes();
        if new_bytes.len() + 1 > available {
            return Err(Error::Other(format!(
                "new dylib path `{new_path}` ({} bytes) does not fit in {available}-byte slot",
                new_bytes.len()
            )));
        }
        let region_start = command.offset + name_offset;
        for (i, byte) in out[region_start..region_start + available].iter_mut().enumerate() {
            *byte = new_bytes.get(i).copied().unwrap_or(0);
        }
        Ok(())
    }

    fn update_segment_file_size(
        &self,
        out: &mut [u8],
        segment_name: [u8; 16],
        new_file_size: u64,
    ) -> Result<()> {
        for command in &self.load_commands {
            if command.cmd != LC_SEGMENT_64 && command.cmd != LC_SEGMENT {
                continue;
            }
            let name_bytes = &command.bytes[8..24];
            if name_bytes != segment_name {
                continue;
            }
            if command.cmd == LC_SEGMENT_64 {
                let offset = command.offset + 40;
                write_u64(out, offset, new_file_size, self.header.is_big_endian);
            } else {
                let offset = command.offset + 24;
                write_u32(out, offset, new_file_size as u32, self.header.is_big_endian);
            }
            return Ok(());
        }
        Err(Error::Other(format!(
            "no segment named {:?} found",
            String::from_utf8_lossy(&segment_name)
        )))
    }
}

fn write_u32(out: &mut [u8], offset: usize, value: u32, big_endian: bool) {
    let bytes = if big_endian {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    out[offset..offset + 4].copy_from_slice(&bytes);
}

fn write_u64(out: &mut [u8], offset: usize, value: u64, big_endian: bool) {
    let bytes = if big_endian {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    out[offset..offset + 8].copy_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_macho_64() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC_64_LE.to_le_bytes());
        buf.extend_from_slice(&0x0100_000Ci32.to_le_bytes()); // CPU_TYPE_ARM64
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes()); // MH_EXECUTE
        buf.extend_from_slice(&1u32.to_le_bytes()); // ncmds
        buf.extend_from_slice(&24u32.to_le_bytes()); // sizeofcmds
        buf.extend_from_slice(&0u32.to_le_bytes()); // flags
        buf.extend_from_slice(&0u32.to_le_bytes()); // reserved

        // One LC_LOAD_DYLIB command, cmdsize 24, name at offset 16.
        buf.extend_from_slice(&LC_LOAD_DYLIB.to_le_bytes());
        buf.extend_from_slice(&24u32.to_le_bytes());
        buf.extend_from_slice(&16u32.to_le_bytes()); // name offset within cmd
        buf.extend_from_slice(&0u32.to_le_bytes()); // timestamp
        buf.extend_from_slice(&0u32.to_le_bytes()); // current_version
        buf.extend_from_slice(&0u32.to_le_bytes()); // compatibility_version
        let mut name = b"@rpath/libfoo.dylib\0".to_vec();
        name.resize(8, 0); // pad/truncate to fill remaining 8 bytes of the 24-byte command
        buf.extend_from_slice(&name);
        buf
    }

    #[test]
    fn parses_header_fields() {
        let data = minimal_macho_64();
        let parsed = parse(&data).unwrap();
        let Parsed::Single(macho) = parsed else {
            panic!("expected single-arch image");
        };
        assert!(macho.header.is_64);
        assert!(!macho.header.is_big_endian);
        assert_eq!(macho.header.ncmds, 1);
        assert_eq!(macho.load_commands.len(), 1);
    }

    #[test]
    fn extracts_dependency_path() {
        let data = minimal_macho_64();
        let Parsed::Single(macho) = parse(&data).unwrap() else {
            unreachable!()
        };
        let deps = macho.dependency_paths().unwrap();
        assert_eq!(deps, vec!["@rpath/l".to_string()]);
    }

    #[test]
    fn rejects_truncated_input() {
        let err = parse(&[0u8, 1, 2]).unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }
}
