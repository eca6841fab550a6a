use std::{io::Read, ptr::NonNull};

use libc::sbrk;
use fitalloc::{FreeListAllocator, HeapGrowth, Sbrk};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_alloc(
  allocator: &FreeListAllocator<Sbrk>,
  size: usize,
  address: Option<NonNull<u8>>,
) {
  println!(
    "Allocated {} bytes, address = {:?}, program break = {:?}",
    size,
    address.map(NonNull::as_ptr),
    allocator.heap().top()
  );
}

fn print_free_list(allocator: &FreeListAllocator<Sbrk>) {
  println!("free list ({} blocks):", allocator.free_list().length());
  for block in allocator.free_list().iter() {
    println!(
      "  {:#x}: capacity = {}, last size = {}",
      block.address, block.capacity, block.size
    );
  }
}

fn main() {
  let mut allocator = FreeListAllocator::sbrk();

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Three allocations, each appended at the heap top.
    // --------------------------------------------------------------------
    let first = allocator.allocate(100);
    print_alloc(&allocator, 100, first);
    let second = allocator.allocate(200);
    print_alloc(&allocator, 200, second);
    let third = allocator.allocate(300);
    print_alloc(&allocator, 300, third);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Release the first block. It is not at the top, so it goes to the
    //    free list.
    // --------------------------------------------------------------------
    allocator.release(first);
    println!("\n[2] Released first block");
    print_free_list(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) A 50 byte request reuses the freed block and splits off the rest.
    // --------------------------------------------------------------------
    let fourth = allocator.allocate(50);
    print_alloc(&allocator, 50, fourth);
    println!("[3] reused first block? {}", fourth == first);
    print_free_list(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) A large block at the top goes straight back to the OS on release.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");
    let big = allocator.allocate(64 * 1024);
    print_alloc(&allocator, 64 * 1024, big);
    print_program_break("after large alloc");
    allocator.release(big);
    print_program_break("after large release");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Release the rest and dump the counters.
    // --------------------------------------------------------------------
    allocator.release(fourth);
    allocator.release(second);
    allocator.release(third);
    print_free_list(&allocator);

    println!("\n{}", allocator.stats());
  }
}
