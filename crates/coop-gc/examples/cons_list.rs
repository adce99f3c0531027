//! A toy list interpreter heap.
//!
//! Values are tagged payloads laid out by hand, the way a small VM would do
//! it. The "VM" keeps its roots in a register file and marks them before
//! every collection.

use std::mem;
use std::ptr::NonNull;

use coop_gc::{AllocError, Heap, HeapConfig, Malloc, Marker};

const TAG_INT: u64 = 1;
const TAG_CONS: u64 = 2;

#[repr(C)]
struct Value {
    tag: u64,
    int: i64,
    car: Option<NonNull<u8>>,
    cdr: Option<NonNull<u8>>,
}

fn visit_value(marker: &mut Marker<'_>, ptr: NonNull<u8>) {
    let value = unsafe { ptr.cast::<Value>().as_ref() };
    if value.tag == TAG_CONS {
        unsafe {
            marker.mark(value.car, Some(visit_value));
            marker.mark(value.cdr, Some(visit_value));
        }
    }
}

struct Vm {
    heap: Heap<Malloc>,
    registers: Vec<Option<NonNull<u8>>>,
}

impl Vm {
    fn new() -> Self {
        Self {
            heap: Heap::with_config(Malloc, HeapConfig::from_env()),
            registers: vec![None; 4],
        }
    }

    fn alloc(&mut self, value: Value) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.heap.alloc(mem::size_of::<Value>())?;
        unsafe { ptr.cast::<Value>().as_ptr().write(value) };
        Ok(ptr)
    }

    fn int(&mut self, n: i64) -> Result<NonNull<u8>, AllocError> {
        self.alloc(Value {
            tag: TAG_INT,
            int: n,
            car: None,
            cdr: None,
        })
    }

    fn cons(&mut self, car: NonNull<u8>, cdr: Option<NonNull<u8>>) -> Result<NonNull<u8>, AllocError> {
        self.alloc(Value {
            tag: TAG_CONS,
            int: 0,
            car: Some(car),
            cdr,
        })
    }

    fn gc(&mut self) {
        let Self { heap, registers } = self;
        // SAFETY: registers only hold payloads that survived every collection.
        unsafe {
            heap.mark_with(|marker| {
                for root in registers.iter() {
                    marker.mark(*root, Some(visit_value));
                }
            });
        }
        let stats = heap.collect();
        println!("gc #{}:\n{stats}", stats.cycle);
    }

    fn sum(list: Option<NonNull<u8>>) -> i64 {
        let mut total = 0;
        let mut cursor = list;
        while let Some(cell) = cursor {
            let cell = unsafe { cell.cast::<Value>().as_ref() };
            if let Some(car) = cell.car {
                total += unsafe { car.cast::<Value>().as_ref().int };
            }
            cursor = cell.cdr;
        }
        total
    }
}

fn main() -> Result<(), AllocError> {
    let mut vm = Vm::new();

    // r0 = (1 2 3 ... 10)
    let mut list = None;
    for n in (1..=10).rev() {
        let int = vm.int(n)?;
        list = Some(vm.cons(int, list)?);
    }
    vm.registers[0] = list;

    // Temporary garbage: a list nobody holds on to.
    let mut scratch = None;
    for n in 0..100 {
        let int = vm.int(n)?;
        scratch = Some(vm.cons(int, scratch)?);
    }
    let _ = scratch;

    vm.gc();
    println!("live blocks: {}", vm.heap.len());
    println!("sum of r0: {}", Vm::sum(vm.registers[0]));

    vm.registers[0] = None;
    vm.gc();
    println!("live blocks after clearing r0: {}", vm.heap.len());

    let report = vm.heap.teardown();
    println!("{report}");
    Ok(())
}
