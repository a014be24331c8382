use std::io::{self, Read, Write};

mod macros;

/// A trait for reading a value from a byte source. The wire format is
/// little-endian throughout, so the byte order is fixed rather than
/// being a parameter.
pub trait ReadFrom {
	fn read_from<T: Read>(source: &mut T) -> io::Result<Self>
	where
		Self: Sized;
}

/// A trait for writing a value to a byte target in wire order.
pub trait WriteTo {
	fn write_to<T: Write>(&self, target: &mut T) -> io::Result<()>;
}

/// A trait for determining the size of a value as encoded on the wire.
pub trait Size {
	fn size(&self) -> usize;
}

impl ReadFrom for u8 {
	fn read_from<T: Read>(source: &mut T) -> io::Result<Self> {
		let mut buf = [0u8; 1];
		source.read_exact(&mut buf)?;
		Ok(buf[0])
	}
}

impl Size for u8 {
	fn size(&self) -> usize {
		1
	}
}

impl WriteTo for u8 {
	fn write_to<T: Write>(&self, target: &mut T) -> io::Result<()> {
		target.write_all(&[*self])
	}
}

impl ReadFrom for u16 {
	fn read_from<T: Read>(source: &mut T) -> io::Result<Self> {
		let mut buf = [0u8; 2];
		source.read_exact(&mut buf)?;
		Ok(u16::from_le_bytes(buf))
	}
}

impl Size for u16 {
	fn size(&self) -> usize {
		2
	}
}

impl WriteTo for u16 {
	fn write_to<T: Write>(&self, target: &mut T) -> io::Result<()> {
		target.write_all(&self.to_le_bytes())
	}
}

impl ReadFrom for u32 {
	fn read_from<T: Read>(source: &mut T) -> io::Result<Self> {
		let mut buf = [0u8; 4];
		source.read_exact(&mut buf)?;
		Ok(u32::from_le_bytes(buf))
	}
}

impl Size for u32 {
	fn size(&self) -> usize {
		4
	}
}

impl WriteTo for u32 {
	fn write_to<T: Write>(&self, target: &mut T) -> io::Result<()> {
		target.write_all(&self.to_le_bytes())
	}
}

impl ReadFrom for u64 {
	fn read_from<T: Read>(source: &mut T) -> io::Result<Self> {
		let mut buf = [0u8; 8];
		source.read_exact(&mut buf)?;
		Ok(u64::from_le_bytes(buf))
	}
}

impl Size for u64 {
	fn size(&self) -> usize {
		8
	}
}

impl WriteTo for u64 {
	fn write_to<T: Write>(&self, target: &mut T) -> io::Result<()> {
		target.write_all(&self.to_le_bytes())
	}
}

impl<const SIZE: usize> ReadFrom for [u8; SIZE] {
	fn read_from<T: Read>(source: &mut T) -> io::Result<Self> {
		let mut buf = [0u8; SIZE];
		source.read_exact(&mut buf)?;
		Ok(buf)
	}
}

impl<const SIZE: usize> Size for [u8; SIZE] {
	fn size(&self) -> usize {
		SIZE
	}
}

impl<const SIZE: usize> WriteTo for [u8; SIZE] {
	fn write_to<T: Write>(&self, target: &mut T) -> io::Result<()> {
		target.write_all(self)
	}
}
