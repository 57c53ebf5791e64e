//! Bit level reading and writing over byte streams.
//!
//! Bits are packed most significant bit first.  Both sides keep a small `BitVec`
//! holding the bits of the byte(s) currently in flight, the bits behind the cursor
//! are periodically dropped so the buffer stays small.

use bit_vec::BitVec;
use std::io::{Read,Write,BufReader,BufWriter};

/// A single binary choice, used both for bits in the stream and for
/// the left/right choices in a code table.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum Bit {
    Zero,
    One
}

impl From<bool> for Bit {
    fn from(b: bool) -> Self {
        match b {
            true => Bit::One,
            false => Bit::Zero
        }
    }
}

impl From<Bit> for bool {
    fn from(b: Bit) -> Self {
        b == Bit::One
    }
}

/// Reads bits from any `Read` object, pulling one byte at a time.
pub struct BitReader<R: Read> {
    reader: BufReader<R>,
    bits: BitVec,
    ptr: usize,
    count: u64
}

/// Writes bits to any `Write` object.
pub struct BitWriter<W: Write> {
    writer: BufWriter<W>,
    bits: BitVec,
    count: u64
}

impl <R: Read> BitReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            bits: BitVec::new(),
            ptr: 0,
            count: 0
        }
    }
    /// keep the bit vector small, we don't need the bits behind us
    fn drop_leading_bits(&mut self) {
        let cpy = self.bits.clone();
        self.bits = BitVec::new();
        for i in self.ptr..cpy.len() {
            self.bits.push(cpy[i]);
        }
        self.ptr = 0;
    }
    /// Get the next bit, reading from the stream as needed.
    /// Running out of data is an `UnexpectedEof` error, there is no implicit padding.
    pub fn read_bit(&mut self) -> Result<Bit,std::io::Error> {
        if let Some(bit) = self.bits.get(self.ptr) {
            self.ptr += 1;
            return Ok(Bit::from(bit));
        }
        let mut by: [u8;1] = [0];
        self.reader.read_exact(&mut by)?;
        self.count += 1;
        if self.bits.len() > 512 {
            self.drop_leading_bits();
        }
        self.bits.append(&mut BitVec::from_bytes(&by));
        self.read_bit()
    }
    /// Read `num_bits` bits and compose them MSB first.
    pub fn read_bits(&mut self,num_bits: usize) -> Result<usize,std::io::Error> {
        assert!(num_bits <= usize::BITS as usize);
        let mut ans: usize = 0;
        for _i in 0..num_bits {
            ans <<= 1;
            if self.read_bit()? == Bit::One {
                ans |= 1;
            }
        }
        Ok(ans)
    }
    /// number of bytes pulled from the underlying reader so far
    pub fn bytes_consumed(&self) -> u64 {
        self.count
    }
}

impl <W: Write> BitWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            bits: BitVec::new(),
            count: 0
        }
    }
    /// Send all complete bytes to the writer, the partial byte stays in the buffer.
    fn drain_whole_bytes(&mut self) -> Result<(),std::io::Error> {
        let whole = self.bits.len() / 8;
        if whole == 0 {
            return Ok(());
        }
        let bytes = self.bits.to_bytes();
        self.writer.write_all(&bytes[0..whole])?;
        self.count += whole as u64;
        let mut rem = BitVec::new();
        for i in whole*8..self.bits.len() {
            rem.push(self.bits[i]);
        }
        self.bits = rem;
        Ok(())
    }
    pub fn write_bit(&mut self,bit: Bit) -> Result<(),std::io::Error> {
        self.bits.push(bit.into());
        if self.bits.len() >= 512 {
            self.drain_whole_bytes()?;
        }
        Ok(())
    }
    /// output the low `num_bits` of `val`, starting from the MSB
    pub fn write_bits(&mut self,val: usize,num_bits: usize) -> Result<(),std::io::Error> {
        assert!(num_bits <= usize::BITS as usize);
        for i in (0..num_bits).rev() {
            self.write_bit(Bit::from((val >> i) & 1 > 0))?;
        }
        Ok(())
    }
    /// number of bits written since the last byte boundary, 0 through 7
    pub fn bit_offset(&self) -> usize {
        self.bits.len() % 8
    }
    /// Write out everything including a partial byte (zero padded), and flush the writer.
    /// Writing more bits after this starts a new byte.
    pub fn flush(&mut self) -> Result<(),std::io::Error> {
        while self.bit_offset() > 0 {
            self.bits.push(false);
        }
        self.drain_whole_bytes()?;
        self.writer.flush()
    }
    /// number of bytes sent to the underlying writer so far
    pub fn bytes_written(&self) -> u64 {
        self.count
    }
}

#[test]
fn read_msb_first() {
    let dat: [u8;2] = [0b1010_0000,0x41];
    let mut reader = BitReader::new(&dat[..]);
    assert_eq!(reader.read_bit().unwrap(),Bit::One);
    assert_eq!(reader.read_bit().unwrap(),Bit::Zero);
    assert_eq!(reader.read_bits(6).unwrap(),0b100000);
    assert_eq!(reader.read_bits(8).unwrap(),0x41);
    assert_eq!(reader.bytes_consumed(),2);
}

#[test]
fn read_past_end() {
    let dat: [u8;1] = [0xff];
    let mut reader = BitReader::new(&dat[..]);
    assert_eq!(reader.read_bits(7).unwrap(),0x7f);
    match reader.read_bits(2) {
        Err(e) => assert_eq!(e.kind(),std::io::ErrorKind::UnexpectedEof),
        Ok(_) => panic!("read beyond the end of the stream")
    }
}

#[test]
fn long_read() {
    let dat: Vec<u8> = (0..200).collect();
    let mut reader = BitReader::new(&dat[..]);
    for i in 0..200 {
        assert_eq!(reader.read_bits(8).unwrap(),i);
    }
}

#[test]
fn write_and_pad() {
    let mut ans: Vec<u8> = Vec::new();
    let mut writer = BitWriter::new(&mut ans);
    writer.write_bits(0b101,3).unwrap();
    assert_eq!(writer.bit_offset(),3);
    writer.write_bits(0x1ff,9).unwrap();
    assert_eq!(writer.bit_offset(),4);
    writer.flush().unwrap();
    assert_eq!(writer.bytes_written(),2);
    drop(writer);
    assert_eq!(ans,vec![0b1011_1111,0b1111_0000]);
}

#[test]
fn long_write() {
    let mut ans: Vec<u8> = Vec::new();
    let mut writer = BitWriter::new(&mut ans);
    writer.write_bit(Bit::One).unwrap();
    for i in 0..300 {
        writer.write_bits(i & 0xff,8).unwrap();
    }
    writer.flush().unwrap();
    assert_eq!(writer.bytes_written(),301);
    drop(writer);
    let mut reader = BitReader::new(&ans[..]);
    assert_eq!(reader.read_bit().unwrap(),Bit::One);
    for i in 0..300 {
        assert_eq!(reader.read_bits(8).unwrap(),i & 0xff);
    }
    assert_eq!(reader.read_bits(7).unwrap(),0);
}
