//! Copy-on-write across fork, write faults and exit.

use kernel_alloc::buddy::{BlockSlot, BuddyAllocator, BuddyConfig};
use kernel_alloc::vmm::{FaultResolution, Process, Vmm};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_registers::{Badv, ControlRegisters, ShadowRegisters};
use kernel_vmem::address_space::RootPage;
use kernel_vmem::{FrameAlloc, HostPhysMemory, PageEntryBits, SharedMemoryRegistry};

const DATA: VirtualAddress = VirtualAddress::new(0x0040_0000);
const STACK: VirtualAddress = VirtualAddress::new(0x1fff_f000);

struct Task(RootPage);

impl Process for Task {
    fn page_directory(&self) -> RootPage {
        self.0
    }

    fn image_end(&self) -> VirtualAddress {
        VirtualAddress::zero()
    }
}

#[derive(Default)]
struct Registry {
    detached: Vec<PhysicalPage<Size4K>>,
}

impl SharedMemoryRegistry for Registry {
    fn detach(&mut self, page: PhysicalPage<Size4K>) {
        self.detached.push(page);
    }
}

struct Storage {
    config: BuddyConfig,
    ram: HostPhysMemory,
    slots: Vec<BlockSlot>,
    counts: Vec<u8>,
}

fn storage() -> Storage {
    let config = BuddyConfig {
        max_order: 8,
        ..BuddyConfig::default()
    };
    Storage {
        config,
        ram: HostPhysMemory::covering(config.base, config.end()),
        slots: vec![BlockSlot::default(); config.arena_pages()],
        counts: vec![0; config.frames_needed()],
    }
}

fn fault(regs: &ShadowRegisters, va: VirtualAddress) {
    regs.store(Badv::new(va));
}

fn page_at<A: FrameAlloc>(
    vmm: &Vmm<'_, HostPhysMemory, ShadowRegisters, A>,
    task: &Task,
    va: VirtualAddress,
) -> PhysicalPage<Size4K> {
    vmm.address_space(task)
        .lookup(va)
        .and_then(|entry| entry.page())
        .expect("mapped")
}

#[test]
fn fork_write_and_exit() {
    let Storage {
        config,
        ram,
        mut slots,
        mut counts,
    } = storage();
    let regs = ShadowRegisters::new();
    let mut buddy = BuddyAllocator::init(config, &ram, &mut slots, &mut counts).unwrap();

    {
        let mut vmm = Vmm::new(&ram, &regs, &mut buddy);
        let parent = Task(vmm.create_address_space().unwrap());
        for va in [DATA, STACK] {
            fault(&regs, va);
            let _ = vmm.handle_missing_page(&parent, &mut ());
        }
        let original = page_at(&vmm, &parent, DATA);
        ram.write_bytes(original.base(), b"parent");

        // Two children share the page with the parent.
        let (first, stats) = vmm.fork_address_space(&parent).unwrap();
        assert_eq!(stats.shared, 2);
        assert_eq!(stats.skipped, 0);
        let first = Task(first);
        assert_eq!(vmm.alloc().share_count(original), 2);
        let second = Task(vmm.fork_address_space(&parent).unwrap().0);
        assert_eq!(vmm.alloc().share_count(original), 3);

        let parent_entry = vmm.address_space(&parent).lookup(DATA).unwrap();
        assert!(!parent_entry.is_dirty());
        assert_eq!(vmm.address_space(&first).lookup(DATA), Some(parent_entry));
        assert_eq!(vmm.address_space(&second).lookup(DATA), Some(parent_entry));

        // The first child writes: it gets its own copy.
        fault(&regs, DATA + 8);
        let FaultResolution::Copied { from, to } = vmm.handle_write_fault(&first) else {
            panic!("expected a copy");
        };
        assert_eq!(from, original);
        assert_eq!(vmm.alloc().share_count(original), 2);
        assert_eq!(vmm.alloc().share_count(to), 1);
        assert_eq!(ram.read_bytes(to.base(), 6), b"parent");
        assert_eq!(
            vmm.address_space(&first).lookup(DATA).unwrap().raw(),
            to.base().as_u64() | PageEntryBits::user_rw().into_bits()
        );

        ram.write_bytes(to.base(), b"child!");
        assert_eq!(ram.read_bytes(original.base(), 6), b"parent");

        // Parent still shares with the second child.
        fault(&regs, DATA);
        assert!(matches!(
            vmm.handle_write_fault(&parent),
            FaultResolution::Copied { from, .. } if from == original
        ));
        assert_eq!(vmm.alloc().share_count(original), 1);

        // The second child is now the sole owner.
        fault(&regs, DATA);
        assert_eq!(
            vmm.handle_write_fault(&second),
            FaultResolution::MadeWritable(original)
        );
        assert!(vmm.address_space(&second).lookup(DATA).unwrap().is_dirty());
        assert_eq!(page_at(&vmm, &second, DATA), original);

        for task in [&parent, &first, &second] {
            let teardown = vmm.release_address_space(task, &mut ());
            assert_eq!(teardown.pages, 2);
            assert_eq!(teardown.detached, 0);
        }
    }

    assert_eq!(buddy.presence_bitmap(), 1 << 8);
    assert_eq!(buddy.shutdown(), 0);
}

#[test]
fn shared_memory_attachments_are_not_inherited() {
    let Storage {
        config,
        ram,
        mut slots,
        mut counts,
    } = storage();
    let regs = ShadowRegisters::new();
    let mut buddy = BuddyAllocator::init(config, &ram, &mut slots, &mut counts).unwrap();
    let mut vmm = Vmm::new(&ram, &regs, &mut buddy);

    let owner = Task(vmm.create_address_space().unwrap());
    let peer = Task(vmm.create_address_space().unwrap());
    fault(&regs, DATA);
    let _ = vmm.handle_missing_page(&owner, &mut ());
    let segment = page_at(&vmm, &owner, DATA);

    // Attach the same page writable in a second process.
    vmm.alloc().share_4k(segment);
    vmm.address_space(&peer)
        .map_page(vmm.alloc(), DATA, segment, PageEntryBits::user_rw());

    let (child, stats) = vmm.fork_address_space(&owner).unwrap();
    assert_eq!(stats.shared, 0);
    assert_eq!(stats.skipped, 1);
    let child = Task(child);
    assert_eq!(vmm.address_space(&child).lookup(DATA), None);
    assert_eq!(vmm.alloc().share_count(segment), 2);

    let mut registry = Registry::default();
    let teardown = vmm.release_address_space(&owner, &mut registry);
    assert_eq!(teardown.detached, 1);
    assert_eq!(registry.detached, [segment]);
    assert_eq!(vmm.alloc().share_count(segment), 1);

    let teardown = vmm.release_address_space(&peer, &mut registry);
    assert_eq!(teardown.detached, 0);
    assert_eq!(vmm.alloc().share_count(segment), 0);

    let _ = vmm.release_address_space(&child, &mut registry);
    drop(vmm);
    assert_eq!(buddy.shutdown(), 0);
}

#[test]
#[should_panic(expected = "panic: try to remap!")]
fn remapping_a_live_page_is_fatal() {
    let Storage {
        config,
        ram,
        mut slots,
        mut counts,
    } = storage();
    let regs = ShadowRegisters::new();
    let mut buddy = BuddyAllocator::init(config, &ram, &mut slots, &mut counts).unwrap();
    let mut vmm = Vmm::new(&ram, &regs, &mut buddy);

    let task = Task(vmm.create_address_space().unwrap());
    fault(&regs, DATA);
    let _ = vmm.handle_missing_page(&task, &mut ());

    let other = vmm.alloc().get_page();
    vmm.address_space(&task)
        .map_page(vmm.alloc(), DATA, other, PageEntryBits::user_rw());
}

#[test]
#[should_panic(expected = "panic: try to remap!")]
fn second_missing_page_fault_on_a_mapped_page_is_fatal() {
    let Storage {
        config,
        ram,
        mut slots,
        mut counts,
    } = storage();
    let regs = ShadowRegisters::new();
    let mut buddy = BuddyAllocator::init(config, &ram, &mut slots, &mut counts).unwrap();
    let mut vmm = Vmm::new(&ram, &regs, &mut buddy);

    let task = Task(vmm.create_address_space().unwrap());
    fault(&regs, DATA);
    let _ = vmm.handle_missing_page(&task, &mut ());
    let _ = vmm.handle_missing_page(&task, &mut ());
}

#[test]
#[should_panic(expected = "panic: out of memory!")]
fn exhaustion_during_a_fault_is_fatal() {
    let Storage {
        config,
        ram,
        mut slots,
        mut counts,
    } = storage();
    let regs = ShadowRegisters::new();
    let mut buddy = BuddyAllocator::init(config, &ram, &mut slots, &mut counts).unwrap();
    let mut vmm = Vmm::new(&ram, &regs, &mut buddy);
    let task = Task(vmm.create_address_space().unwrap());

    // One directory, one table, 254 data pages, then nothing.
    for n in 0..255 {
        fault(&regs, DATA + n * 4096);
        let _ = vmm.handle_missing_page(&task, &mut ());
    }
}
