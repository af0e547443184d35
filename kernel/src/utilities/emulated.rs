// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register blocks backed by host memory.
//!
//! Drivers take a `StaticRef` to their register block. For host tests the
//! block is a zeroed heap allocation instead of a peripheral, so driver code
//! runs unchanged and tests inspect or preset raw words by byte offset.
//!
//! Plain memory does not emulate hardware side effects: write-one-to-clear
//! flags stay set, self-clearing bits never clear and status bits only change
//! when a test pokes them.

use alloc::alloc::{alloc_zeroed, handle_alloc_error, Layout};
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::utilities::StaticRef;

pub struct EmulatedRegisters<T> {
    base: NonNull<u8>,
    size: usize,
    _marker: PhantomData<T>,
}

impl<T> Default for EmulatedRegisters<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EmulatedRegisters<T> {
    /// Allocate a zeroed register block.
    ///
    /// The allocation is never freed so that `StaticRef`s handed out stay
    /// valid for the rest of the test binary.
    pub fn new() -> Self {
        let layout = Layout::new::<T>();
        assert!(layout.size() > 0, "empty register block");
        // SAFETY: the layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = match NonNull::new(ptr) {
            Some(base) => base,
            None => handle_alloc_error(layout),
        };
        Self {
            base,
            size: layout.size(),
            _marker: PhantomData,
        }
    }

    /// Handle to the block, for the driver under test.
    pub fn registers(&self) -> StaticRef<T> {
        // SAFETY: the block is sized and aligned for `T`, zero is a valid bit
        // pattern for register words, and the allocation is leaked.
        unsafe { StaticRef::new(self.base.as_ptr().cast::<T>()) }
    }

    fn word(&self, offset: usize) -> *mut u32 {
        assert!(offset % 4 == 0, "unaligned register offset {:#x}", offset);
        assert!(offset + 4 <= self.size, "register offset {:#x} out of block", offset);
        // SAFETY: the offset was checked to lie inside the allocation.
        unsafe { self.base.as_ptr().add(offset).cast::<u32>() }
    }

    /// Read the word at `offset` bytes from the start of the block.
    pub fn peek(&self, offset: usize) -> u32 {
        // SAFETY: `word` returns an aligned pointer inside the allocation.
        unsafe { self.word(offset).read_volatile() }
    }

    /// Overwrite the word at `offset` bytes from the start of the block.
    pub fn poke(&self, offset: usize, value: u32) {
        // SAFETY: `word` returns an aligned pointer inside the allocation.
        unsafe { self.word(offset).write_volatile(value) }
    }

    pub fn set_bits(&self, offset: usize, mask: u32) {
        self.poke(offset, self.peek(offset) | mask);
    }

    pub fn clear_bits(&self, offset: usize, mask: u32) {
        self.poke(offset, self.peek(offset) & !mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::registers::interfaces::{Readable, Writeable};
    use crate::utilities::registers::{register_structs, ReadOnly, ReadWrite};

    register_structs! {
        Block {
            (0x000 => ctrl: ReadWrite<u32>),
            (0x004 => status: ReadOnly<u32>),
            (0x008 => @END),
        }
    }

    #[test]
    fn driver_writes_are_visible_to_the_test() {
        let emu = EmulatedRegisters::<Block>::new();
        let regs = emu.registers();
        regs.ctrl.set(0xA5);
        assert_eq!(0xA5, emu.peek(0x0));
    }

    #[test]
    fn read_only_registers_can_be_preset() {
        let emu = EmulatedRegisters::<Block>::new();
        emu.set_bits(0x4, 1 << 3);
        emu.set_bits(0x4, 1 << 0);
        emu.clear_bits(0x4, 1 << 3);
        assert_eq!(1, emu.registers().status.get());
    }
}
