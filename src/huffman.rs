//! Static Huffman Compression
//!
//! The compressed stream is self-describing: it starts with the tree, followed by
//! the codes for each input byte, followed by the end-of-message code, followed by
//! zero bits up to the next byte boundary.  There is no length field.
//!
//! The tree is serialized depth first:
//! * `1` is a branch, followed by the left subtree and then the right subtree
//! * `01` is a leaf, followed by 8 bits giving the symbol, MSB first
//! * `00` is the end-of-message leaf
//!
//! Building a good tree is up to the caller, see `HuffTree::from_frequencies`.

use std::io::{Cursor,Read,Write,ErrorKind};
use crate::tools::bitio::{Bit,BitReader,BitWriter};
use crate::tools::huff_tree::{HuffTree,CodeTable,Symbol};
use crate::DYNERR;

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// number of bytes to request from the input at a time, 0 is treated as 1
    pub chunk_size: usize
}

pub const STD_OPTIONS: Options = Options {
    chunk_size: 512
};

/// Read a tree description.  Upon return the reader is positioned at the bit
/// immediately following the description.  A truncated description is an
/// `UnexpectedEof` error.  Depth is limited only by the length of the stream.
pub fn read_tree<R: Read>(reader: &mut BitReader<R>) -> Result<HuffTree,std::io::Error> {
    // branches still waiting for children, holding the left child once it is complete
    let mut pending: Vec<Option<HuffTree>> = Vec::new();
    loop {
        let mut node = match reader.read_bit()? {
            Bit::One => {
                pending.push(None);
                continue;
            },
            Bit::Zero => match reader.read_bit()? {
                Bit::One => HuffTree::Leaf(reader.read_bits(8)? as u8),
                Bit::Zero => HuffTree::EndMessage
            }
        };
        // attach the finished subtree, closing every branch it completes
        loop {
            match pending.pop() {
                None => return Ok(node),
                Some(None) => {
                    pending.push(Some(node));
                    break;
                },
                Some(Some(left)) => node = HuffTree::branch(left,node)
            }
        }
    }
}

/// Write a tree description.  The writer is not flushed.
pub fn write_tree<W: Write>(tree: &HuffTree,writer: &mut BitWriter<W>) -> Result<(),std::io::Error> {
    for node in tree.nodes() {
        match node {
            HuffTree::Branch(..) => writer.write_bit(Bit::One)?,
            HuffTree::Leaf(val) => {
                writer.write_bits(0b01,2)?;
                writer.write_bits(*val as usize,8)?;
            },
            HuffTree::EndMessage => writer.write_bits(0b00,2)?
        }
    }
    Ok(())
}

fn put_code<W: Write>(codes: &CodeTable,sym: Symbol,writer: &mut BitWriter<W>) -> Result<(),DYNERR> {
    let code = match codes.get(&sym) {
        Some(c) => c,
        None => {
            log::error!("no code for {:?}",sym);
            let err = match sym {
                Symbol::Byte(val) => crate::Error::SymbolNotInTree(val),
                Symbol::EndMessage => crate::Error::EndMarkerCount(0)
            };
            return Err(Box::new(err));
        }
    };
    log::trace!("{:?} -> {} bits",sym,code.len());
    for bit in code {
        writer.write_bit(*bit)?;
    }
    Ok(())
}

/// Main compression function.
/// `tree` must have exactly one end-of-message leaf and a leaf for every byte in the input.
/// `expanded_in` is an object with the `Read` trait, usually `std::fs::File`, or `&[u8]`.
/// `compressed_out` is an object with the `Write` trait, usually `std::fs::File`, or `Vec<u8>`.
/// Returns (in_size,out_size) or error.  After an error `compressed_out` may hold a
/// partial stream, e.g., the codes for the bytes that came before one missing from the tree.
pub fn compress<R,W>(tree: &HuffTree, expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    tree.validate()?;
    let mut writer = BitWriter::new(compressed_out);
    log::debug!("write tree with {} leaves",tree.leaf_count());
    write_tree(tree,&mut writer)?;
    let codes = CodeTable::from_tree(tree);

    let mut buf = vec![0;usize::max(opt.chunk_size,1)];
    let mut in_size: u64 = 0;
    log::debug!("entering loop over chunks");
    loop {
        let count = match expanded_in.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind()==ErrorKind::Interrupted => continue,
            Err(e) => return Err(Box::new(e))
        };
        for by in &buf[0..count] {
            put_code(&codes,Symbol::Byte(*by),&mut writer)?;
        }
        in_size += count as u64;
    }
    log::debug!("coded {} bytes, closing stream",in_size);
    put_code(&codes,Symbol::EndMessage,&mut writer)?;
    let pad = (8 - writer.bit_offset()) % 8;
    writer.write_bits(0,pad)?;
    writer.flush()?;
    Ok((in_size,writer.bytes_written()))
}

/// Main decompression function.
/// `compressed_in` is an object with the `Read` trait, usually `std::fs::File`, or `&[u8]`.
/// `expanded_out` is an object with the `Write` trait, usually `std::fs::File`, or `Vec<u8>`.
/// The only way to finish is to decode the end-of-message code, running out of data
/// before that is an `UnexpectedEof` error.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    let mut reader = BitReader::new(compressed_in);
    let tree = read_tree(&mut reader)?;
    log::debug!("read tree with {} leaves",tree.leaf_count());
    tree.validate()?;
    let mut ans: Vec<u8> = Vec::new();
    log::debug!("enter main decoding loop");
    loop {
        match tree.decode(&mut reader)? {
            Symbol::Byte(val) => {
                log::trace!("decoded {}",val);
                ans.push(val);
            },
            Symbol::EndMessage => break
        }
    }
    log::debug!("end of message after {} symbols",ans.len());
    expanded_out.write_all(&ans)?;
    expanded_out.flush()?;
    Ok((reader.bytes_consumed(),ans.len() as u64))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(tree: &HuffTree,slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Vec<u8> = Vec::new();
    compress(tree,&mut src,&mut ans,opt)?;
    Ok(ans)
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8]) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Vec<u8> = Vec::new();
    expand(&mut src,&mut ans)?;
    Ok(ans)
}

// *************** TESTS *****************

#[cfg(test)]
fn ab_tree() -> HuffTree {
    HuffTree::branch(HuffTree::Leaf(b'A'),HuffTree::branch(HuffTree::Leaf(b'B'),HuffTree::EndMessage))
}

#[test]
fn tree_description_bits() {
    // 1 01 01000001 1 01 01000010 00
    let mut ans: Vec<u8> = Vec::new();
    let mut writer = BitWriter::new(&mut ans);
    write_tree(&ab_tree(),&mut writer).unwrap();
    assert_eq!(writer.bit_offset(),0);
    writer.flush().unwrap();
    drop(writer);
    assert_eq!(ans,hex::decode("A83508").unwrap());
}

#[test]
fn tree_round_trip_leaves_cursor() {
    // tree description followed by a marker byte that must not be consumed
    let dat = hex::decode("A835085A").unwrap();
    let mut reader = BitReader::new(&dat[..]);
    assert_eq!(read_tree(&mut reader).unwrap(),ab_tree());
    assert_eq!(reader.read_bits(8).unwrap(),0x5a);

    // unaligned: a lone end marker followed by 6 bits
    let dat: [u8;1] = [0b0010_1101];
    let mut reader = BitReader::new(&dat[..]);
    assert_eq!(read_tree(&mut reader).unwrap(),HuffTree::EndMessage);
    assert_eq!(reader.read_bits(6).unwrap(),0b101101);
}

#[test]
fn deep_tree_round_trip() {
    // left-leaning chain of every byte value
    let mut tree = HuffTree::EndMessage;
    for i in 0..=255 {
        tree = HuffTree::branch(tree,HuffTree::Leaf(i));
    }
    let mut ans: Vec<u8> = Vec::new();
    let mut writer = BitWriter::new(&mut ans);
    write_tree(&tree,&mut writer).unwrap();
    writer.write_bits(0b111,3).unwrap();
    writer.flush().unwrap();
    drop(writer);
    let mut reader = BitReader::new(&ans[..]);
    assert_eq!(read_tree(&mut reader).unwrap(),tree);
    assert_eq!(reader.read_bits(3).unwrap(),0b111);
}

#[test]
fn truncated_tree() {
    for dat in ["","A8","A835"] {
        let bytes = hex::decode(dat).unwrap();
        let mut reader = BitReader::new(&bytes[..]);
        match read_tree(&mut reader) {
            Err(e) => assert_eq!(e.kind(),ErrorKind::UnexpectedEof),
            Ok(_) => panic!("partial tree was returned")
        }
    }
}

#[test]
fn compression_works() {
    // tree, then 0 10 11 000
    let compressed = compress_slice(&ab_tree(),b"AB",&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("A8350858").unwrap());
    // empty input gets only the end code
    let compressed = compress_slice(&ab_tree(),b"",&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("A83508C0").unwrap());
}

#[test]
fn chunk_size_does_not_matter() {
    let test_data = "ABBA BABA ABBABAB".replace(" ","");
    let mut opt = STD_OPTIONS;
    let expected = compress_slice(&ab_tree(),test_data.as_bytes(),&opt).expect("compression failed");
    for chunk_size in [0,1,2,3,7,100] {
        opt.chunk_size = chunk_size;
        let compressed = compress_slice(&ab_tree(),test_data.as_bytes(),&opt).expect("compression failed");
        assert_eq!(compressed,expected);
    }
}

#[test]
fn byte_alignment() {
    // end marker at depth 8 so that some messages come out aligned before padding
    let mut tree = HuffTree::EndMessage;
    for i in 0..8 {
        tree = HuffTree::branch(HuffTree::Leaf(i),tree);
    }
    // leaf 7 has a 1 bit code, the end marker an 8 bit code
    let tree_bits = 8 + 8*10 + 2;
    for len in 0..20 {
        let test_data = vec![7;len];
        let compressed = compress_slice(&tree,&test_data,&STD_OPTIONS).expect("compression failed");
        let total_bits = tree_bits + len + 8;
        assert_eq!(compressed.len(),(total_bits + 7)/8);
        assert_eq!(expand_slice(&compressed).expect("expansion failed"),test_data);
    }
}

#[test]
fn missing_symbol() {
    match compress_slice(&ab_tree(),b"ABC",&STD_OPTIONS) {
        Err(e) => assert!(matches!(e.downcast_ref::<crate::Error>(),Some(crate::Error::SymbolNotInTree(b'C')))),
        Ok(_) => panic!("compressed a symbol that is not in the tree")
    }
}

#[test]
fn bad_trees_are_refused() {
    let no_end = HuffTree::branch(HuffTree::Leaf(b'A'),HuffTree::Leaf(b'B'));
    assert!(compress_slice(&no_end,b"AB",&STD_OPTIONS).is_err());
    // a lone leaf would decode forever without consuming bits
    let lone_leaf: [u8;2] = [0b0101_0000,0b0100_0000];
    match expand_slice(&lone_leaf) {
        Err(e) => assert!(matches!(e.downcast_ref::<crate::Error>(),Some(crate::Error::EndMarkerCount(0)))),
        Ok(_) => panic!("expanded with a tree lacking an end marker")
    }
}

#[test]
fn expansion_works() {
    assert_eq!(expand_slice(&hex::decode("A8350858").unwrap()).expect("expansion failed"),b"AB".to_vec());
    assert_eq!(expand_slice(&hex::decode("A83508C0").unwrap()).expect("expansion failed"),Vec::<u8>::new());
    // trailing data after the padding is never looked at
    assert_eq!(expand_slice(&hex::decode("A8350858FFFF").unwrap()).expect("expansion failed"),b"AB".to_vec());
}

#[test]
fn missing_end_marker() {
    // codes run out before the end-of-message code
    for dat in ["A83508","A8350800"] {
        match expand_slice(&hex::decode(dat).unwrap()) {
            Err(e) => {
                let io_err = e.downcast_ref::<std::io::Error>().expect("wrong error type");
                assert_eq!(io_err.kind(),ErrorKind::UnexpectedEof);
            },
            Ok(_) => panic!("expanded a stream without an end marker")
        }
    }
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let freq = crate::tools::huff_tree::make_freq_table(&mut &test_data[..]).unwrap();
    let tree = HuffTree::from_frequencies(&freq);
    let compressed = compress_slice(&tree,test_data,&STD_OPTIONS).expect("compression failed");
    assert!(compressed.len() < test_data.len() + 64);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    // tree covering every byte, data longer than a chunk
    let test_data: Vec<u8> = (0..5000).map(|i| ((i*i) % 251) as u8).collect();
    let mut freq = [1;256];
    freq[0] = 1000;
    let tree = HuffTree::from_frequencies(&freq);
    let compressed = compress_slice(&tree,&test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn stream_sizes() {
    let mut src: &[u8] = b"ABAB";
    let mut ans: Vec<u8> = Vec::new();
    let (in_size,out_size) = compress(&ab_tree(),&mut src,&mut ans,&STD_OPTIONS).expect("compression failed");
    assert_eq!((in_size,out_size),(4,ans.len() as u64));
    let mut expanded: Vec<u8> = Vec::new();
    let (in_size,out_size) = expand(&mut &ans[..],&mut expanded).expect("expansion failed");
    assert_eq!((in_size,out_size),(ans.len() as u64,4));
}

#[test]
fn endless_branches() {
    // nothing but branch bits, the tree never closes
    let dat = vec![0xff;200_000];
    match expand_slice(&dat) {
        Err(e) => {
            let io_err = e.downcast_ref::<std::io::Error>().expect("wrong error type");
            assert_eq!(io_err.kind(),ErrorKind::UnexpectedEof);
        },
        Ok(_) => panic!("expanded a stream with an unterminated tree")
    }
}

#[test]
fn very_deep_tree() {
    // 1^n 00 (01 'A')^n is a left-leaning chain with the end marker at depth n,
    // followed by the end code, n zero bits
    let depth = 200_000;
    let mut dat: Vec<u8> = Vec::new();
    let mut writer = BitWriter::new(&mut dat);
    for _i in 0..depth {
        writer.write_bit(Bit::One).unwrap();
    }
    writer.write_bits(0b00,2).unwrap();
    for _i in 0..depth {
        writer.write_bits(0b01,2).unwrap();
        writer.write_bits(b'A' as usize,8).unwrap();
    }
    for _i in 0..depth {
        writer.write_bit(Bit::Zero).unwrap();
    }
    writer.flush().unwrap();
    drop(writer);
    assert_eq!(expand_slice(&dat).expect("expansion failed"),Vec::<u8>::new());
    // same stream with the end code cut off
    match expand_slice(&dat[0..dat.len() - depth/8]) {
        Err(e) => assert!(e.downcast_ref::<std::io::Error>().is_some()),
        Ok(_) => panic!("expanded a stream without an end code")
    }
}

#[test]
fn missing_symbol_after_long_prefix() {
    let mut test_data = vec![b'A';9000];
    test_data.push(b'C');
    let mut src: &[u8] = &test_data;
    let mut ans: Vec<u8> = Vec::new();
    match compress(&ab_tree(),&mut src,&mut ans,&STD_OPTIONS) {
        Err(e) => assert!(matches!(e.downcast_ref::<crate::Error>(),Some(crate::Error::SymbolNotInTree(b'C')))),
        Ok(_) => panic!("compressed a symbol that is not in the tree")
    }
}

#[test]
fn independent_threads() {
    let handles: Vec<_> = ["I am Sam. Sam I am.","I do not like green eggs and ham."].iter().map(|txt| {
        let test_data = txt.repeat(100).into_bytes();
        std::thread::spawn(move || {
            let freq = crate::tools::huff_tree::make_freq_table(&mut &test_data[..]).unwrap();
            let tree = HuffTree::from_frequencies(&freq);
            let compressed = compress_slice(&tree,&test_data,&STD_OPTIONS).expect("compression failed");
            let expanded = expand_slice(&compressed).expect("expansion failed");
            assert_eq!(expanded,test_data);
        })
    }).collect();
    for h in handles {
        h.join().expect("thread failed");
    }
}
