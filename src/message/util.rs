use std::io::{self, prelude::*};

/// Largest frame accepted from a peer. A length prefix above this is treated
/// as a corrupt stream rather than allocated.
pub const MAX_FRAME_SIZE: usize = 1 << 30;

/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
/// 
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}

/// Read a usize out of the given stream.
/// 
pub fn read_usize<R: Read>(stream: &mut R) -> io::Result<usize> {
    read_bytes_array(stream).map(usize::from_le_bytes)
}

/// Read the given number of bytes from a stream, into a vec.
/// 
pub fn read_bytes_vec<R: Read>(stream: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0; size];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Read the given (const) number of bytes from a stream, into an array.
/// 
pub fn read_bytes_array<R: Read, const SIZE: usize>(stream: &mut R) -> io::Result<[u8; SIZE]> {
    let mut buffer = [0; SIZE];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Write a length-prefixed frame.
///
pub fn write_frame<W: Write>(stream: &mut W, bytes: &[u8]) -> io::Result<()> {
    stream.write_all(&bytes.len().to_le_bytes())?;
    stream.write_all(bytes)?;
    stream.flush()
}

/// Read a length-prefixed frame. Fails with `InvalidData` if the prefix
/// exceeds `MAX_FRAME_SIZE`.
///
pub fn read_frame<R: Read>(stream: &mut R) -> io::Result<Vec<u8>> {
    let size = read_usize(stream)?;

    if size > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds the limit of {}", size, MAX_FRAME_SIZE),
        ));
    }
    read_bytes_vec(stream, size)
}
