//! Stack (bump) allocation over a single memory block
//!
//! A [`Stack`] hands out bytes from a fixed region by advancing a `used`
//! offset. Nothing is freed individually: a stack is either cleared, or a
//! local scope is opened and everything allocated inside it is reclaimed
//! when the scope ends. Sub-stacks carve their region out of a parent.
//!
//! Every stack keeps its bookkeeping header inside the block it manages, so a
//! master stack of `size` bytes has `size - HEADER_SIZE` usable bytes.
//!
//! Running out of space and unbalanced scopes are programmer errors and
//! panic. Size the block up front.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};

/// Raw handle value meaning "no record"
pub const NIL: u32 = u32::MAX;

/// Largest alignment a record stored in a stack may require
const MAX_ALIGN: usize = 8;

/// Bookkeeping record written at the start of every stack
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
struct StackHeader {
    /// Absolute byte offset of the first usable byte
    base: u64,
    size: u64,
    used: u64,
    /// Open local scopes
    count: u64,
}

/// Bytes a stack reserves for its own header
pub const HEADER_SIZE: usize = size_of::<StackHeader>();

/// Backing memory, word-sized so typed records can be borrowed in place
type Memory = Rc<RefCell<Box<[u64]>>>;

/// A byte range handed out by [`Stack::allocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    offset: usize,
    len: usize,
}

impl Block {
    /// Absolute offset into the memory block
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Typed handle to a single `T` living in a stack
///
/// Handles are plain offsets. They stay valid for as long as the allocation
/// they came from (until the stack is cleared or the enclosing scope ends).
pub struct ArenaPtr<T> {
    offset: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArenaPtr<T> {
    fn new(offset: usize) -> Self {
        Self {
            offset: handle_offset(offset),
            _marker: PhantomData,
        }
    }

    /// Rebuild a handle from its raw value. [`NIL`] maps to `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != NIL).then_some(Self {
            offset: raw,
            _marker: PhantomData,
        })
    }

    pub fn raw(self) -> u32 {
        self.offset
    }

    /// Raw value of an optional handle, for storing in `Pod` records
    pub fn pack(ptr: Option<Self>) -> u32 {
        ptr.map_or(NIL, Self::raw)
    }
}

impl<T> Clone for ArenaPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaPtr<T> {}

impl<T> PartialEq for ArenaPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<T> Eq for ArenaPtr<T> {}

impl<T> Hash for ArenaPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.offset.hash(state);
    }
}

impl<T> fmt::Debug for ArenaPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaPtr({:#x})", self.offset)
    }
}

/// Typed handle to `len` consecutive `T`s living in a stack
pub struct ArenaSlice<T> {
    offset: u32,
    len: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArenaSlice<T> {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Clone for ArenaSlice<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaSlice<T> {}

impl<T> fmt::Debug for ArenaSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaSlice({:#x}; {})", self.offset, self.len)
    }
}

/// Snapshot taken by [`Stack::begin_scope`], consumed by [`Stack::end_scope`]
#[must_use = "a scope must be ended with Stack::end_scope"]
#[derive(Debug)]
pub struct ScopeToken {
    /// Address of the memory block the stack lives in
    memory: usize,
    /// Header offset of the stack within that block
    stack: usize,
    used: u64,
}

/// A bump allocator over a region of a shared memory block
pub struct Stack {
    memory: Memory,
    /// Byte offset of this stack's header
    header: usize,
}

impl Stack {
    /// Create a self-hosted stack over a fresh, zeroed block of `size` bytes
    pub fn new(size: usize) -> Self {
        let words = size.div_ceil(size_of::<u64>());
        Self::from_block(vec![0u64; words].into_boxed_slice(), size)
    }

    /// Create a self-hosted stack over an existing block
    ///
    /// The header takes the first [`HEADER_SIZE`] bytes, the rest is usable.
    pub fn from_block(block: Box<[u64]>, size: usize) -> Self {
        assert!(
            size > HEADER_SIZE,
            "stack of {size} bytes cannot hold its {HEADER_SIZE} byte header"
        );
        assert!(
            size <= block.len() * size_of::<u64>(),
            "stack size {size} exceeds its block"
        );
        let stack = Self {
            memory: Rc::new(RefCell::new(block)),
            header: 0,
        };
        stack.write_header(&StackHeader {
            base: HEADER_SIZE as u64,
            size: (size - HEADER_SIZE) as u64,
            used: 0,
            count: 0,
        });
        stack
    }

    /// Carve a child stack of `size` bytes (header included) out of this one
    pub fn create_substack(&mut self, size: usize) -> Stack {
        assert!(
            size > HEADER_SIZE,
            "sub-stack of {size} bytes cannot hold its {HEADER_SIZE} byte header"
        );
        let header = self.allocate_aligned(HEADER_SIZE, align_of::<StackHeader>(), true);
        let region = self.allocate(size - HEADER_SIZE, false);
        let child = Stack {
            memory: Rc::clone(&self.memory),
            header: header.offset,
        };
        child.write_header(&StackHeader {
            base: region.offset as u64,
            size: region.len as u64,
            used: 0,
            count: 0,
        });
        child
    }

    /// Usable bytes (header excluded)
    pub fn size(&self) -> usize {
        self.read_header().size as usize
    }

    pub fn used(&self) -> usize {
        self.read_header().used as usize
    }

    pub fn remaining(&self) -> usize {
        let header = self.read_header();
        (header.size - header.used) as usize
    }

    /// Number of local scopes currently open
    pub fn depth(&self) -> u32 {
        self.read_header().count as u32
    }

    /// Forget every allocation and open scope
    pub fn clear(&mut self) {
        let mut header = self.read_header();
        header.used = 0;
        header.count = 0;
        self.write_header(&header);
    }

    /// Bump `size` bytes, optionally zeroing them
    pub fn allocate(&mut self, size: usize, zero: bool) -> Block {
        self.allocate_aligned(size, 1, zero)
    }

    /// Bump `src.len()` bytes and copy `src` into them
    pub fn allocate_copy(&mut self, src: &[u8]) -> Block {
        let block = self.allocate(src.len(), false);
        self.with_bytes_mut(block, |dst| dst.copy_from_slice(src));
        block
    }

    fn allocate_aligned(&mut self, size: usize, align: usize, zero: bool) -> Block {
        let mut header = self.read_header();
        let top = (header.base + header.used) as usize;
        let offset = top.next_multiple_of(align);
        let needed = (offset - top) + size;
        assert!(
            header.used as usize + needed <= header.size as usize,
            "stack overflow: {} used + {} requested > {} bytes",
            header.used,
            needed,
            header.size
        );
        header.used += needed as u64;
        self.write_header(&header);

        let block = Block { offset, len: size };
        if zero {
            self.with_bytes_mut(block, |bytes| bytes.fill(0));
        }
        block
    }

    /// Push a copy of `value`
    pub fn push<T: Pod>(&mut self, value: &T) -> ArenaPtr<T> {
        let block = self.allocate_aligned(size_of::<T>(), record_align::<T>(), false);
        self.with_bytes_mut(block, |bytes| bytes.copy_from_slice(bytemuck::bytes_of(value)));
        ArenaPtr::new(block.offset)
    }

    /// Push an all-zero `T`
    pub fn push_zeroed<T: Pod>(&mut self) -> ArenaPtr<T> {
        let block = self.allocate_aligned(size_of::<T>(), record_align::<T>(), true);
        ArenaPtr::new(block.offset)
    }

    /// Push `count` all-zero `T`s
    pub fn push_array<T: Pod>(&mut self, count: usize) -> ArenaSlice<T> {
        let block = self.allocate_aligned(size_of::<T>() * count, record_align::<T>(), true);
        ArenaSlice {
            offset: handle_offset(block.offset),
            len: handle_offset(count),
            _marker: PhantomData,
        }
    }

    /// Read a copy of the record behind `ptr`
    pub fn get<T: Pod>(&self, ptr: ArenaPtr<T>) -> T {
        let block = self.block_of(ptr);
        self.with_bytes(block, bytemuck::pod_read_unaligned)
    }

    /// Overwrite the record behind `ptr`
    pub fn set<T: Pod>(&mut self, ptr: ArenaPtr<T>, value: &T) {
        let block = self.block_of(ptr);
        self.with_bytes_mut(block, |bytes| bytes.copy_from_slice(bytemuck::bytes_of(value)));
    }

    /// Read-modify-write the record behind `ptr`
    pub fn update<T: Pod, R>(&mut self, ptr: ArenaPtr<T>, f: impl FnOnce(&mut T) -> R) -> R {
        let block = self.block_of(ptr);
        self.with_bytes_mut(block, |bytes| f(bytemuck::from_bytes_mut(bytes)))
    }

    /// Borrow a pushed array in place
    pub fn with_slice_mut<T: Pod, R>(
        &mut self,
        slice: ArenaSlice<T>,
        f: impl FnOnce(&mut [T]) -> R,
    ) -> R {
        let block = Block {
            offset: slice.offset as usize,
            len: slice.len() * size_of::<T>(),
        };
        self.with_bytes_mut(block, |bytes| f(bytemuck::cast_slice_mut(bytes)))
    }

    pub fn with_bytes<R>(&self, block: Block, f: impl FnOnce(&[u8]) -> R) -> R {
        self.check_block(block);
        let memory = self.memory.borrow();
        let bytes: &[u8] = bytemuck::cast_slice(&memory[..]);
        f(&bytes[block.offset..block.offset + block.len])
    }

    pub fn with_bytes_mut<R>(&mut self, block: Block, f: impl FnOnce(&mut [u8]) -> R) -> R {
        self.check_block(block);
        let mut memory = self.memory.borrow_mut();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut memory[..]);
        f(&mut bytes[block.offset..block.offset + block.len])
    }

    /// Open a local scope: everything allocated until the matching
    /// [`Stack::end_scope`] is reclaimed at once
    pub fn begin_scope(&mut self) -> ScopeToken {
        let mut header = self.read_header();
        header.count += 1;
        self.write_header(&header);
        ScopeToken {
            memory: self.memory_id(),
            stack: self.header,
            used: header.used,
        }
    }

    /// Close the innermost local scope
    pub fn end_scope(&mut self, token: ScopeToken) {
        let mut header = self.read_header();
        assert!(
            token.memory == self.memory_id() && token.stack == self.header,
            "scope ended on a different stack"
        );
        assert!(header.count > 0, "scope ended on a stack with no open scope");
        assert!(
            header.used >= token.used,
            "scope mismatch: used {} is below the scope start {}",
            header.used,
            token.used
        );
        header.used = token.used;
        header.count -= 1;
        self.write_header(&header);
    }

    /// Open a local scope that ends when the guard is dropped
    pub fn local(&mut self) -> LocalStack<'_> {
        let token = self.begin_scope();
        LocalStack {
            stack: self,
            token: Some(token),
        }
    }

    fn memory_id(&self) -> usize {
        Rc::as_ptr(&self.memory) as usize
    }

    fn block_of<T>(&self, ptr: ArenaPtr<T>) -> Block {
        Block {
            offset: ptr.offset as usize,
            len: size_of::<T>(),
        }
    }

    fn check_block(&self, block: Block) {
        let header = self.read_header();
        let start = header.base as usize;
        let end = start + header.size as usize;
        assert!(
            block.offset >= start && block.offset + block.len <= end,
            "block {block:?} lies outside stack region {start}..{end}"
        );
    }

    fn read_header(&self) -> StackHeader {
        let memory = self.memory.borrow();
        let bytes: &[u8] = bytemuck::cast_slice(&memory[..]);
        bytemuck::pod_read_unaligned(&bytes[self.header..self.header + HEADER_SIZE])
    }

    fn write_header(&self, header: &StackHeader) {
        let mut memory = self.memory.borrow_mut();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut memory[..]);
        bytes[self.header..self.header + HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(header));
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.read_header();
        f.debug_struct("Stack")
            .field("header", &self.header)
            .field("base", &header.base)
            .field("size", &header.size)
            .field("used", &header.used)
            .field("depth", &header.count)
            .finish()
    }
}

/// Scope guard returned by [`Stack::local`]
///
/// Derefs to the stack so allocations go through the guard. Nested guards
/// borrow the outer one, so scopes always close in LIFO order.
pub struct LocalStack<'a> {
    stack: &'a mut Stack,
    token: Option<ScopeToken>,
}

impl Deref for LocalStack<'_> {
    type Target = Stack;

    fn deref(&self) -> &Stack {
        self.stack
    }
}

impl DerefMut for LocalStack<'_> {
    fn deref_mut(&mut self) -> &mut Stack {
        self.stack
    }
}

impl Drop for LocalStack<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.stack.end_scope(token);
        }
    }
}

fn record_align<T>() -> usize {
    let align = align_of::<T>();
    assert!(align <= MAX_ALIGN, "records aligned above {MAX_ALIGN} bytes are not supported");
    align
}

fn handle_offset(offset: usize) -> u32 {
    assert!(offset < NIL as usize, "offset {offset} is outside the handle range");
    offset as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct Pair {
        a: u32,
        b: f32,
    }

    #[test]
    fn test_new_reserves_header() {
        let stack = Stack::new(1024);
        assert_eq!(stack.size(), 1024 - HEADER_SIZE);
        assert_eq!(stack.used(), 0);
        assert_eq!(stack.remaining(), 1024 - HEADER_SIZE);
    }

    #[test]
    #[should_panic(expected = "header")]
    fn test_new_too_small() {
        let _ = Stack::new(HEADER_SIZE);
    }

    #[test]
    fn test_allocate_bumps_used() {
        let mut stack = Stack::new(256);
        let a = stack.allocate(10, true);
        let b = stack.allocate(6, false);
        assert_eq!(stack.used(), 16);
        assert_eq!(b.offset(), a.offset() + 10);
        stack.with_bytes(a, |bytes| assert!(bytes.iter().all(|&b| b == 0)));
    }

    #[test]
    #[should_panic(expected = "stack overflow")]
    fn test_allocate_overflow_panics() {
        let mut stack = Stack::new(64);
        let _ = stack.allocate(64 - HEADER_SIZE + 1, false);
    }

    #[test]
    fn test_allocate_exactly_full() {
        let mut stack = Stack::new(64);
        let _ = stack.allocate(64 - HEADER_SIZE, false);
        assert_eq!(stack.remaining(), 0);
    }

    #[test]
    fn test_allocate_copy() {
        let mut stack = Stack::new(128);
        let block = stack.allocate_copy(b"chunk");
        stack.with_bytes(block, |bytes| assert_eq!(bytes, b"chunk"));
    }

    #[test]
    fn test_typed_records() {
        let mut stack = Stack::new(256);
        let _ = stack.allocate(3, false);
        let ptr = stack.push(&Pair { a: 7, b: 1.5 });
        assert_eq!(ptr.raw() as usize % align_of::<Pair>(), 0);
        assert_eq!(stack.get(ptr), Pair { a: 7, b: 1.5 });

        stack.update(ptr, |pair| pair.a += 1);
        assert_eq!(stack.get(ptr).a, 8);

        stack.set(ptr, &Pair { a: 1, b: 2.0 });
        assert_eq!(stack.get(ptr), Pair { a: 1, b: 2.0 });
    }

    #[test]
    fn test_push_array_in_place() {
        let mut stack = Stack::new(256);
        let slice = stack.push_array::<u32>(4);
        stack.with_slice_mut(slice, |values| {
            assert_eq!(values, &[0, 0, 0, 0]);
            values.copy_from_slice(&[4, 1, 3, 2]);
            values.sort_unstable();
        });
        stack.with_slice_mut(slice, |values| assert_eq!(values, &[1, 2, 3, 4]));
    }

    #[test]
    fn test_nil_handles() {
        assert!(ArenaPtr::<Pair>::from_raw(NIL).is_none());
        assert_eq!(ArenaPtr::<Pair>::pack(None), NIL);
        let ptr = ArenaPtr::<Pair>::from_raw(40).unwrap();
        assert_eq!(ArenaPtr::pack(Some(ptr)), 40);
    }

    #[test]
    fn test_substack_carves_parent() {
        let mut master = Stack::new(1024);
        let before = master.used();
        let mut child = master.create_substack(256);
        assert_eq!(master.used() - before, 256);
        assert_eq!(child.size(), 256 - HEADER_SIZE);

        let ptr = child.push(&Pair { a: 3, b: 4.0 });
        assert_eq!(child.get(ptr).a, 3);
        // parent allocations land after the child's region
        let block = master.allocate(8, false);
        assert!(block.offset() as u32 > ptr.raw());
    }

    #[test]
    fn test_clear_resets() {
        let mut stack = Stack::new(128);
        let _ = stack.allocate(40, false);
        let _token = stack.begin_scope();
        stack.clear();
        assert_eq!(stack.used(), 0);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_nested_scopes() {
        let mut stack = Stack::new(512);
        let _ = stack.allocate(8, false);
        let outer = stack.begin_scope();
        let _ = stack.allocate(16, false);
        let inner = stack.begin_scope();
        let _ = stack.allocate(32, false);
        assert_eq!(stack.depth(), 2);
        stack.end_scope(inner);
        assert_eq!(stack.used(), 24);
        stack.end_scope(outer);
        assert_eq!(stack.used(), 8);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "scope mismatch")]
    fn test_end_scope_below_snapshot_panics() {
        let mut stack = Stack::new(256);
        let _ = stack.allocate(16, false);
        let token = stack.begin_scope();
        let _other = stack.begin_scope();
        stack.clear();
        let _ = stack.begin_scope();
        stack.end_scope(token);
    }

    #[test]
    #[should_panic(expected = "no open scope")]
    fn test_end_scope_without_open_scope_panics() {
        let mut stack = Stack::new(256);
        let token = stack.begin_scope();
        stack.clear();
        stack.end_scope(token);
    }

    #[test]
    #[should_panic(expected = "different stack")]
    fn test_end_scope_on_wrong_stack_panics() {
        let mut master = Stack::new(1024);
        let mut child = master.create_substack(128);
        let token = child.begin_scope();
        let _ = master.begin_scope();
        master.end_scope(token);
    }

    #[test]
    #[should_panic(expected = "different stack")]
    fn test_end_scope_on_other_master_panics() {
        let mut permanent = Stack::new(1024);
        let mut temporary = Stack::new(1024);
        let _ = permanent.allocate(100, false);
        let _outer = permanent.begin_scope();
        let _ = permanent.allocate(50, false);
        let token = temporary.begin_scope();
        permanent.end_scope(token);
    }

    #[test]
    #[should_panic(expected = "outside stack region")]
    fn test_handle_from_other_stack_panics() {
        let mut master = Stack::new(1024);
        let mut child = master.create_substack(128);
        let ptr = master.push(&Pair { a: 7, b: 2.0 });
        let _ = child.get(ptr);
    }

    #[test]
    fn test_local_guard_restores_on_drop() {
        let mut stack = Stack::new(512);
        let _ = stack.allocate(4, false);
        {
            let mut frame = stack.local();
            let _ = frame.allocate(100, true);
            {
                let mut inner = frame.local();
                let _ = inner.push(&Pair { a: 1, b: 1.0 });
                assert_eq!(inner.depth(), 2);
            }
            assert_eq!(frame.used(), 104);
        }
        assert_eq!(stack.used(), 4);
        assert_eq!(stack.depth(), 0);
    }

    proptest! {
        #[test]
        fn prop_scope_round_trip(prefix in 0usize..512, sizes in prop::collection::vec(0usize..256, 0..8)) {
            let mut stack = Stack::new(4096);
            let _ = stack.allocate(prefix, false);
            let before = stack.used();
            let token = stack.begin_scope();
            for size in sizes {
                let _ = stack.allocate(size, size % 2 == 0);
            }
            stack.end_scope(token);
            prop_assert_eq!(stack.used(), before);
            prop_assert_eq!(stack.depth(), 0);
        }
    }
}
