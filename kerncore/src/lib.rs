// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]

/// Describes types that act as "slices" (in the very abstract sense) referenced
/// by processes in IPC calls.
///
/// This is not a Rust slice, because this is just a base-length pair ---
/// taken by itself, it doesn't let you actually _access_ the memory.
///
/// # Invariants
///
/// `s.is_empty()` implies `s.base_addr() == s.end_addr()`, and vice versa.
///
/// `s.base_addr() <= s.end_addr()` must hold.
pub trait UserSlice {
    /// Checks whether the slice spans zero bytes. Empty slices are opted out of
    /// access checking.
    fn is_empty(&self) -> bool;

    /// The address of the first byte included in this slice.
    fn base_addr(&self) -> usize;

    /// The address of the first byte _not_ included in this slice, past the
    /// end.
    fn end_addr(&self) -> usize;
}

impl<T: UserSlice> UserSlice for &T {
    #[inline(always)]
    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    #[inline(always)]
    fn base_addr(&self) -> usize {
        (**self).base_addr()
    }

    #[inline(always)]
    fn end_addr(&self) -> usize {
        (**self).end_addr()
    }
}

/// Describes types that indicate region permissions.
///
/// This type is _almost_ identical to `UserSlice` but has slightly different
/// operations defined on it. Those operations _do not_ include region
/// attributes; we handle those generically using a predicate when required.
///
/// # Invariants
///
/// `r.contains(x)` implies `r.base_addr() <= x < r.end_addr()` and vice versa.
///
/// By extension, `r.base_addr() <= r.end_addr()` must hold.
pub trait MemoryRegion {
    fn contains(&self, addr: usize) -> bool;
    fn base_addr(&self) -> usize;
    fn end_addr(&self) -> usize;
}

impl<T: MemoryRegion> MemoryRegion for &T {
    #[inline(always)]
    fn contains(&self, addr: usize) -> bool {
        (**self).contains(addr)
    }

    #[inline(always)]
    fn base_addr(&self) -> usize {
        (**self).base_addr()
    }

    #[inline(always)]
    fn end_addr(&self) -> usize {
        (**self).end_addr()
    }
}

/// Generic version of the kernel's message-buffer range check.
///
/// Determines whether a process can access some memory. The memory is
/// described by `slice` and consists of a single contiguous region. The
/// process's access permissions are described by `table`, an array of region
/// descriptors.
///
/// The exact implementation of both the slice type `S` and the region type
/// `R` are left unspecified here, to avoid relying on kernel-internal types.
/// The requirements for each are specified by [`UserSlice`] and
/// [`MemoryRegion`], respectively.
///
/// Not all region descriptors confer the same rights --- some are read-only,
/// some may represent an address-space hole that cannot be accessed at all.
/// To reflect this, this routine takes a `region_ok` predicate over the `R`
/// type.
///
/// # Preconditions
///
/// `table` must be sorted by region base address, and the regions in the
/// table must not overlap.
///
/// Both `slice` and each element of `table` must meet the properties
/// described on [`UserSlice`] and [`MemoryRegion`], respectively.
///
/// # Returns
///
/// `true` if `slice` is completely covered by one or more regions in `table`
/// that meet the `region_ok` condition.
///
/// `false` otherwise.
pub fn can_access<S, R>(
    slice: S,
    table: &[R],
    region_ok: impl Fn(&R) -> bool,
) -> bool
where
    S: UserSlice,
    R: MemoryRegion,
{
    if slice.is_empty() {
        // Empty slices confer no authority as far as the kernel is
        // concerned, and are exempt from the check.
        return true;
    }

    // The region table is sorted in ascending order of base address, and the
    // regions within it do not overlap, per the function's preconditions.
    // This lets us use a one-pass algorithm.
    let start_addr = slice.base_addr();
    let end_addr = slice.end_addr();

    let mut i = 0;
    for region in table {
        if region.contains(start_addr) {
            if !region_ok(region) {
                return false;
            }

            if end_addr <= region.end_addr() {
                // The slice is exhausted within this region.
                return true;
            }

            // The start region is permissible but doesn't contain the end
            // address. Look for the end region starting from the next one.
            i += 1;
            break;
        }
        if region.base_addr() > end_addr {
            // Passed the target address without finding a covering region.
            return false;
        }
        i += 1;
    }

    // Start region was found; now find the end region.
    for region in &table[i..] {
        if !region_ok(region) {
            break;
        }

        if end_addr <= region.end_addr() {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestSlice {
        base: usize,
        size: usize,
    }

    impl UserSlice for TestSlice {
        fn is_empty(&self) -> bool {
            self.size == 0
        }

        fn base_addr(&self) -> usize {
            self.base
        }

        fn end_addr(&self) -> usize {
            self.base + self.size
        }
    }

    struct TestRegion {
        base: usize,
        size: usize,
        label: String,
    }

    impl MemoryRegion for TestRegion {
        fn contains(&self, addr: usize) -> bool {
            addr >= self.base && addr < self.end_addr()
        }

        fn base_addr(&self) -> usize {
            self.base
        }

        fn end_addr(&self) -> usize {
            self.base + self.size
        }
    }

    fn make_fake_region_table() -> Vec<TestRegion> {
        vec![
            TestRegion {
                base: 0x0099_0000,
                size: 0x0001_0000,
                label: "good".to_string(),
            },
            TestRegion {
                base: 0x009A_0000,
                size: 0x0001_0000,
                label: "good".to_string(),
            },
            TestRegion {
                base: 0x1234_5678,
                size: 0x0001_0000,
                label: "bad".to_string(),
            },
            TestRegion {
                base: 0x1235_5678,
                size: 0x0001_0000,
                label: "bad".to_string(),
            },
            TestRegion {
                base: 0x1236_5678,
                size: 0x0001_0000,
                label: "good".to_string(),
            },
            TestRegion {
                base: 0x1237_5678,
                size: 0x0001_0000,
                label: "bad".to_string(),
            },
            TestRegion {
                base: 0x1238_5678,
                size: 0x0001_0000,
                label: "good".to_string(),
            },
        ]
    }
    const GOOD_REGION_0_IDX: usize = 0;
    const GOOD_REGION_1_IDX: usize = 1;
    const BAD_REGION_0_IDX: usize = 2;
    const BAD_REGION_1_IDX: usize = 3;
    const GOOD_REGION_2_IDX: usize = 4;
    const GOOD_REGION_3_IDX: usize = 6;

    fn accept_any_region_wheee(_: &TestRegion) -> bool {
        true
    }

    fn accept_only_good_regions(r: &TestRegion) -> bool {
        r.label == "good"
    }

    #[test]
    fn can_access_single_good_region() {
        let region_table = make_fake_region_table();
        for i in [GOOD_REGION_0_IDX, GOOD_REGION_1_IDX] {
            assert!(
                can_access(
                    TestSlice {
                        base: region_table[i].base + 10,
                        size: region_table[i].size - 20,
                    },
                    &region_table,
                    accept_only_good_regions,
                ),
                "should be able to access good region {i} but cannot",
            );
        }
    }

    #[test]
    fn cannot_access_single_bad_region() {
        let region_table = make_fake_region_table();
        for i in [BAD_REGION_0_IDX, BAD_REGION_1_IDX] {
            assert!(
                !can_access(
                    TestSlice {
                        base: region_table[i].base + 10,
                        size: region_table[i].size - 20,
                    },
                    &region_table,
                    accept_only_good_regions,
                ),
                "should NOT be able to access bad region {i} but can",
            );
        }
    }

    #[test]
    fn cannot_access_uncontained_memory() {
        let mut last = 0;
        let region_table = make_fake_region_table();
        for region in &region_table {
            if last != region.base_addr() {
                let slice = TestSlice {
                    base: last,
                    size: region.base_addr() - last,
                };
                assert!(
                    !can_access(slice, &region_table, accept_any_region_wheee,),
                    "should NOT be able to access range {last:#x} - {:#x} but can",
                    region.base_addr(),
                );
            }

            last = region.end_addr();
        }
    }

    #[test]
    fn can_access_overlapping_adjacent_good_regions() {
        let region_table = make_fake_region_table();

        let base = region_table[GOOD_REGION_0_IDX].base + 10;
        let end = region_table[GOOD_REGION_1_IDX].end_addr() - 10;
        let slice = TestSlice {
            base,
            size: end - base,
        };

        assert!(
            can_access(slice, &region_table, accept_only_good_regions,),
            "should be able to access slice that spans adjacent ranges, cannot",
        );
    }

    #[test]
    fn cannot_access_overlapping_adjacent_bad_regions() {
        let region_table = make_fake_region_table();

        let base = region_table[BAD_REGION_0_IDX].base + 10;
        let end = region_table[BAD_REGION_1_IDX].end_addr() - 10;
        let slice = TestSlice {
            base,
            size: end - base,
        };

        assert!(
            !can_access(slice, &region_table, accept_only_good_regions,),
            "should NOT be able to access slice that spans adjacent bad ranges, but can",
        );
    }

    #[test]
    fn cannot_access_contiguous_regions_with_bad_region_interleaved() {
        let region_table = make_fake_region_table();

        let base = region_table[GOOD_REGION_2_IDX].base + 10;
        let end = region_table[GOOD_REGION_3_IDX].end_addr() - 10;
        let slice = TestSlice {
            base,
            size: end - base,
        };

        assert!(
            !can_access(slice, &region_table, accept_only_good_regions,),
            "should NOT be able to access slice that starts and ends in good ranges but passes through bad one, but can",
        );
    }

    #[test]
    fn cannot_access_slice_spanning_over_uncontained_memory() {
        let region_table = vec![
            TestRegion {
                base: 0x1238_5678,
                size: 0x0001_0000,
                label: "good".to_string(),
            },
            TestRegion {
                base: 0x123A_5678,
                size: 0x0001_0000,
                label: "good".to_string(),
            },
        ];

        let base = region_table[GOOD_REGION_0_IDX].base + 10;
        let end = region_table[GOOD_REGION_1_IDX].end_addr() - 10;
        let slice = TestSlice {
            base,
            size: end - base,
        };

        assert!(
            !can_access(slice, &region_table, accept_only_good_regions,),
            "should NOT be able to access slice that starts and ends in good ranges but passes through uncontained memory, but can",
        );
    }
}
