//! Static Huffman tree and the code table derived from it.
//! This is used by the `huffman` module.
//!
//! The tree is an ordinary recursive structure, each branch owns its two subtrees.
//! Going left is coded as `Bit::Zero`, going right as `Bit::One`.

use std::cmp::Reverse;
use std::collections::{BinaryHeap,HashMap};
use std::io::{Read,ErrorKind};
use super::bitio::{Bit,BitReader};

/// Huffman tree with payloads at the leaves only
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum HuffTree {
    Branch(Box<HuffTree>,Box<HuffTree>),
    Leaf(u8),
    /// the end-of-message marker, carries no symbol
    EndMessage
}

/// Anything that can appear at a leaf, used as the key of the code table.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,PartialOrd,Ord)]
pub enum Symbol {
    Byte(u8),
    EndMessage
}

/// Map from each symbol in a tree to its root-to-leaf path.
pub struct CodeTable {
    codes: HashMap<Symbol,Vec<Bit>>
}

/// Depth first walk over the nodes of a tree, a branch comes before its left
/// subtree, which comes before its right subtree.  This is the serialization order.
pub struct Nodes<'a> {
    stack: Vec<&'a HuffTree>
}

impl <'a> Iterator for Nodes<'a> {
    type Item = &'a HuffTree;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let HuffTree::Branch(left,right) = node {
            self.stack.push(right.as_ref());
            self.stack.push(left.as_ref());
        }
        Some(node)
    }
}

/// Trees read from a stream can be arbitrarily deep, so the children are
/// taken apart with an explicit stack rather than by recursion.
impl Drop for HuffTree {
    fn drop(&mut self) {
        let mut stack: Vec<HuffTree> = Vec::new();
        if let HuffTree::Branch(left,right) = self {
            stack.push(std::mem::replace(left.as_mut(),HuffTree::EndMessage));
            stack.push(std::mem::replace(right.as_mut(),HuffTree::EndMessage));
        }
        while let Some(mut node) = stack.pop() {
            if let HuffTree::Branch(left,right) = &mut node {
                stack.push(std::mem::replace(left.as_mut(),HuffTree::EndMessage));
                stack.push(std::mem::replace(right.as_mut(),HuffTree::EndMessage));
            }
        }
    }
}

impl HuffTree {
    pub fn branch(left: HuffTree,right: HuffTree) -> Self {
        Self::Branch(Box::new(left),Box::new(right))
    }
    /// Build a tree with a leaf for every byte with nonzero frequency, plus one
    /// end-of-message leaf with weight 1.  The two lightest subtrees are merged
    /// repeatedly, ties go to the subtree that was created first, so the result
    /// only depends on the frequencies.
    pub fn from_frequencies(freq: &[u64;256]) -> Self {
        // slab holds subtrees not yet merged, heap orders them by (weight,creation order)
        let mut slab: Vec<Option<HuffTree>> = Vec::new();
        let mut heap = BinaryHeap::new();
        slab.push(Some(HuffTree::EndMessage));
        heap.push(Reverse((1,0)));
        for (i,f) in freq.iter().enumerate() {
            if *f > 0 {
                heap.push(Reverse((*f,slab.len())));
                slab.push(Some(HuffTree::Leaf(i as u8)));
            }
        }
        while let Some(Reverse((w0,i0))) = heap.pop() {
            let Some(Reverse((w1,i1))) = heap.pop() else {
                return slab[i0].take().unwrap_or(HuffTree::EndMessage);
            };
            let left = slab[i0].take().unwrap_or(HuffTree::EndMessage);
            let right = slab[i1].take().unwrap_or(HuffTree::EndMessage);
            heap.push(Reverse((w0+w1,slab.len())));
            slab.push(Some(HuffTree::branch(left,right)));
        }
        HuffTree::EndMessage
    }
    /// Walk from the root to a leaf, consuming one bit per branch.
    pub fn decode<R: Read>(&self,reader: &mut BitReader<R>) -> Result<Symbol,std::io::Error> {
        let mut node = self;
        loop {
            node = match node {
                HuffTree::Branch(left,right) => match reader.read_bit()? {
                    Bit::Zero => left.as_ref(),
                    Bit::One => right.as_ref()
                },
                HuffTree::Leaf(val) => return Ok(Symbol::Byte(*val)),
                HuffTree::EndMessage => return Ok(Symbol::EndMessage)
            };
        }
    }
    pub fn nodes(&self) -> Nodes {
        Nodes {
            stack: vec![self]
        }
    }
    pub fn leaf_count(&self) -> usize {
        self.nodes().filter(|n| !matches!(n,HuffTree::Branch(..))).count()
    }
    pub fn end_marker_count(&self) -> usize {
        self.nodes().filter(|n| matches!(n,HuffTree::EndMessage)).count()
    }
    /// A tree is usable for coding if it has exactly one end-of-message leaf.
    /// The wire format does not enforce this, so it is checked before coding starts.
    pub fn validate(&self) -> Result<(),crate::Error> {
        match self.end_marker_count() {
            1 => Ok(()),
            n => {
                log::error!("tree has {} end-of-message leaves",n);
                Err(crate::Error::EndMarkerCount(n))
            }
        }
    }
}

impl CodeTable {
    pub fn from_tree(tree: &HuffTree) -> Self {
        let mut ans = Self {
            codes: HashMap::new()
        };
        // A symbol appearing at more than one leaf keeps the first path found.
        // each entry is a node, the length of its parent's path, and the step to the node
        let mut stack: Vec<(&HuffTree,usize,Option<Bit>)> = vec![(tree,0,None)];
        let mut path: Vec<Bit> = Vec::new();
        while let Some((node,depth,step)) = stack.pop() {
            path.truncate(depth);
            if let Some(bit) = step {
                path.push(bit);
            }
            match node {
                HuffTree::Branch(left,right) => {
                    stack.push((right.as_ref(),path.len(),Some(Bit::One)));
                    stack.push((left.as_ref(),path.len(),Some(Bit::Zero)));
                },
                HuffTree::Leaf(val) => {
                    ans.codes.entry(Symbol::Byte(*val)).or_insert_with(|| path.clone());
                },
                HuffTree::EndMessage => {
                    ans.codes.entry(Symbol::EndMessage).or_insert_with(|| path.clone());
                }
            }
        }
        ans
    }
    pub fn get(&self,sym: &Symbol) -> Option<&[Bit]> {
        self.codes.get(sym).map(|v| v.as_slice())
    }
    /// all entries sorted by symbol, end-of-message last
    pub fn entries(&self) -> Vec<(Symbol,&[Bit])> {
        let mut ans: Vec<(Symbol,&[Bit])> = self.codes.iter().map(|(k,v)| (*k,v.as_slice())).collect();
        ans.sort_by_key(|(k,_)| *k);
        ans
    }
}

/// Count how often each byte value appears in the stream.
pub fn make_freq_table<R: Read>(reader: &mut R) -> Result<[u64;256],std::io::Error> {
    let mut ans = [0;256];
    let mut buf: [u8;512] = [0;512];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(ans),
            Ok(n) => n,
            Err(e) if e.kind()==ErrorKind::Interrupted => continue,
            Err(e) => return Err(e)
        };
        for b in &buf[0..n] {
            ans[*b as usize] += 1;
        }
    }
}

#[cfg(test)]
fn sample_tree() -> HuffTree {
    HuffTree::branch(HuffTree::Leaf(b'A'),HuffTree::branch(HuffTree::Leaf(b'B'),HuffTree::EndMessage))
}

#[cfg(test)]
fn is_prefix(a: &[Bit],b: &[Bit]) -> bool {
    a.len() <= b.len() && a == &b[0..a.len()]
}

#[test]
fn code_table_paths() {
    let codes = CodeTable::from_tree(&sample_tree());
    assert_eq!(codes.entries().len(),3);
    assert_eq!(codes.get(&Symbol::Byte(b'A')).unwrap(),&[Bit::Zero]);
    assert_eq!(codes.get(&Symbol::Byte(b'B')).unwrap(),&[Bit::One,Bit::Zero]);
    assert_eq!(codes.get(&Symbol::EndMessage).unwrap(),&[Bit::One,Bit::One]);
    assert!(codes.get(&Symbol::Byte(b'C')).is_none());
}

#[test]
fn decode_walks_tree() {
    // 0 10 11 -> A B end
    let dat: [u8;1] = [0b0101_1000];
    let tree = sample_tree();
    let mut reader = BitReader::new(&dat[..]);
    assert_eq!(tree.decode(&mut reader).unwrap(),Symbol::Byte(b'A'));
    assert_eq!(tree.decode(&mut reader).unwrap(),Symbol::Byte(b'B'));
    assert_eq!(tree.decode(&mut reader).unwrap(),Symbol::EndMessage);
}

#[test]
fn validation() {
    assert!(sample_tree().validate().is_ok());
    assert!(HuffTree::EndMessage.validate().is_ok());
    assert!(HuffTree::Leaf(0).validate().is_err());
    let two_ends = HuffTree::branch(HuffTree::EndMessage,HuffTree::EndMessage);
    assert!(matches!(two_ends.validate(),Err(crate::Error::EndMarkerCount(2))));
}

#[test]
fn tree_from_frequencies() {
    let freq = make_freq_table(&mut "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes()).unwrap();
    assert_eq!(freq[b'S' as usize],3);
    assert_eq!(freq[b'z' as usize],0);
    let tree = HuffTree::from_frequencies(&freq);
    let symbols = freq.iter().filter(|f| **f > 0).count();
    assert_eq!(tree.leaf_count(),symbols + 1);
    assert_eq!(tree.end_marker_count(),1);
    let codes = CodeTable::from_tree(&tree);
    assert_eq!(codes.entries().len(),symbols + 1);
    // most frequent symbol gets a code no longer than the rarest
    let space = codes.get(&Symbol::Byte(b' ')).unwrap().len();
    let newline = codes.get(&Symbol::Byte(b'\n')).unwrap().len();
    assert!(space <= newline);
}

#[test]
fn tree_from_nothing() {
    let tree = HuffTree::from_frequencies(&[0;256]);
    assert_eq!(tree,HuffTree::EndMessage);
    let mut freq = [0;256];
    freq[7] = 10;
    assert_eq!(HuffTree::from_frequencies(&freq),HuffTree::branch(HuffTree::EndMessage,HuffTree::Leaf(7)));
}

#[test]
fn prefix_free() {
    let mut freq = [0;256];
    for i in 0..256 {
        freq[i] = (i as u64 * 7919) % 101;
    }
    let codes = CodeTable::from_tree(&HuffTree::from_frequencies(&freq));
    let entries = codes.entries();
    for (i,(_,a)) in entries.iter().enumerate() {
        for (j,(_,b)) in entries.iter().enumerate() {
            if i != j {
                assert!(!is_prefix(a,b));
            }
        }
    }
}

#[test]
fn preorder_walk() {
    let order: Vec<HuffTree> = sample_tree().nodes().map(|n| match n {
        HuffTree::Branch(..) => HuffTree::EndMessage,
        other => other.clone()
    }).collect();
    assert_eq!(order.len(),5);
    assert_eq!(order[1],HuffTree::Leaf(b'A'));
    assert_eq!(order[3],HuffTree::Leaf(b'B'));
}

#[test]
fn deep_tree_without_recursion() {
    // left-leaning chain far deeper than the thread stack allows for recursive walks
    let depth = 1_000_000;
    let mut tree = HuffTree::EndMessage;
    for _i in 0..depth {
        tree = HuffTree::branch(tree,HuffTree::Leaf(b'A'));
    }
    assert_eq!(tree.leaf_count(),depth + 1);
    assert!(tree.validate().is_ok());
    let codes = CodeTable::from_tree(&tree);
    assert_eq!(codes.get(&Symbol::EndMessage).unwrap().len(),depth);
    // the deepest copy of a repeated symbol is found first
    assert_eq!(codes.get(&Symbol::Byte(b'A')).unwrap().len(),depth);
    drop(tree);
}
