//! Byte-addressed memory for the execution engine
//!
//! Memory is a set of disjoint regions. Every access must fall entirely
//! inside one live region; regions are separated by an unmapped gap, so
//! running off the end of one never lands in the next.

use log::debug;
use std::collections::BTreeMap;
use crate::error::EngineError;

/// First address handed out; keeps 0 (null) unmapped
const BASE_ADDRESS: u64 = 0x1000;

/// Unmapped bytes between consecutive regions
const REGION_GAP: u64 = 16;

/// Who owns a region and therefore who releases it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Allocated by the host through the engine API
    Host,
    /// Allocated by an `alloca`, released when its frame returns
    Stack,
}

#[derive(Debug)]
struct Region {
    kind: RegionKind,
    bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct Memory {
    regions: BTreeMap<u64, Region>,
    next_addr: u64,
    in_use: u64,
    limit: u64,
}

impl Memory {
    pub fn new(limit: u64) -> Self {
        Self {
            regions: BTreeMap::new(),
            next_addr: BASE_ADDRESS,
            in_use: 0,
            limit,
        }
    }

    /// Bytes currently allocated across all live regions
    pub fn in_use(&self) -> u64 {
        self.in_use
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Allocate a zeroed region of `size` bytes, aligned to 16
    pub fn allocate(&mut self, size: u64, kind: RegionKind) -> Result<u64, EngineError> {
        if self.in_use.saturating_add(size) > self.limit {
            return Err(EngineError::OutOfMemory {
                requested: size,
                in_use: self.in_use,
                limit: self.limit,
            });
        }
        let addr = self.next_addr;
        let len = usize::try_from(size).map_err(|_| EngineError::OutOfMemory {
            requested: size,
            in_use: self.in_use,
            limit: self.limit,
        })?;
        self.regions.insert(
            addr,
            Region {
                kind,
                bytes: vec![0; len],
            },
        );
        self.in_use += size;
        self.next_addr = (addr + size + REGION_GAP).div_ceil(16) * 16;
        debug!("Allocated {size} byte(s) at {addr:#x} ({kind:?})");
        Ok(addr)
    }

    /// Release the region starting at `addr`, provided it is of `kind`
    pub fn release(&mut self, addr: u64, kind: RegionKind) -> Result<(), EngineError> {
        match self.regions.get(&addr) {
            Some(region) if region.kind == kind => {
                let size = region.bytes.len() as u64;
                self.regions.remove(&addr);
                self.in_use -= size;
                Ok(())
            }
            _ => Err(EngineError::InvalidFree { addr }),
        }
    }

    pub fn read(&self, addr: u64, len: u64) -> Result<&[u8], EngineError> {
        let (base, region) = self
            .regions
            .range(..=addr)
            .next_back()
            .ok_or(EngineError::OutOfBounds { addr, len })?;
        let range = Self::local_range(*base, region, addr, len)?;
        Ok(&region.bytes[range])
    }

    pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), EngineError> {
        let len = data.len() as u64;
        let (base, region) = self
            .regions
            .range_mut(..=addr)
            .next_back()
            .ok_or(EngineError::OutOfBounds { addr, len })?;
        let range = Self::local_range(*base, region, addr, len)?;
        region.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Little-endian load of `len` (at most 8) bytes
    pub fn read_u64(&self, addr: u64, len: u64) -> Result<u64, EngineError> {
        let bytes = self.read(addr, len.min(8))?;
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Little-endian store of the low `len` (at most 8) bytes of `value`
    pub fn write_u64(&mut self, addr: u64, len: u64, value: u64) -> Result<(), EngineError> {
        let bytes = value.to_le_bytes();
        let len = usize::try_from(len.min(8)).unwrap_or(8);
        self.write(addr, &bytes[..len])
    }

    fn local_range(
        base: u64,
        region: &Region,
        addr: u64,
        len: u64,
    ) -> Result<std::ops::Range<usize>, EngineError> {
        let start = addr - base;
        let end = start.checked_add(len);
        match end {
            Some(end) if end <= region.bytes.len() as u64 => Ok(start as usize..end as usize),
            _ => Err(EngineError::OutOfBounds { addr, len }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_write_roundtrip() {
        let mut memory = Memory::new(1024);
        let addr = memory.allocate(16, RegionKind::Host).unwrap();
        memory.write_u64(addr + 8, 4, 0xdead_beef).unwrap();
        assert_eq!(memory.read_u64(addr + 8, 4).unwrap(), 0xdead_beef);
        assert_eq!(memory.read_u64(addr, 8).unwrap(), 0);
    }

    #[test]
    fn test_one_past_the_end_is_out_of_bounds() {
        let mut memory = Memory::new(1024);
        let addr = memory.allocate(40, RegionKind::Host).unwrap();
        let next = memory.allocate(40, RegionKind::Host).unwrap();
        assert!(next >= addr + 40 + REGION_GAP);

        assert!(memory.read(addr + 32, 8).is_ok());
        assert_eq!(
            memory.read(addr + 40, 8).unwrap_err(),
            EngineError::OutOfBounds { addr: addr + 40, len: 8 }
        );
        // Straddling the end is caught as well
        assert!(memory.write(addr + 36, &[0; 8]).is_err());
    }

    #[test]
    fn test_null_is_unmapped() {
        let memory = Memory::new(1024);
        assert!(matches!(memory.read(0, 1), Err(EngineError::OutOfBounds { .. })));
    }

    #[test]
    fn test_limit_and_release() {
        let mut memory = Memory::new(64);
        let a = memory.allocate(48, RegionKind::Stack).unwrap();
        assert!(matches!(
            memory.allocate(32, RegionKind::Host),
            Err(EngineError::OutOfMemory { .. })
        ));
        assert_eq!(memory.release(a, RegionKind::Host), Err(EngineError::InvalidFree { addr: a }));
        memory.release(a, RegionKind::Stack).unwrap();
        assert_eq!(memory.in_use(), 0);
        assert!(memory.read(a, 1).is_err());
        assert!(memory.allocate(32, RegionKind::Host).is_ok());
    }
}
