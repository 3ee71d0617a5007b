//! Compact excitation link tables.
//!
//! The string-enumeration layer hands over, for every occupation string, a fixed number of
//! single-excitation records as flat `(a, i, destination, sign)` quadruples meaning
//! $`\hat{a}^{\dagger}_a \hat{a}_i |\mathrm{source}\rangle = \pm |\mathrm{destination}\rangle`$.
//! These are packed here into [`ExcitationRecord`]s, grouped contiguously per source string.

use anyhow::{self, ensure};

use crate::error::RdmError;


// ==================
// Struct definitions
// ==================

/// A borrowed, not-yet-validated link index as produced by the string-enumeration layer.
#[derive(Clone, Copy, Debug)]
pub struct LinkIndex<'a> {
    /// Flat `(a, i, destination, sign)` quadruples, `nlink` of them per string.
    pub link_index: &'a [i32],

    /// Number of strings in this spin channel.
    pub nstr: usize,

    /// Number of excitation records per string.
    pub nlink: usize,
}

impl<'a> LinkIndex<'a> {
    /// Wraps a flat link index.
    pub fn new(link_index: &'a [i32], nstr: usize, nlink: usize) -> Self {
        Self {
            link_index,
            nstr,
            nlink,
        }
    }

    /// Validates and packs this link index.
    pub fn compact(&self, norb: usize) -> Result<CompactLinkTable, anyhow::Error> {
        compact_links(self.link_index, norb, self.nstr, self.nlink)
    }
}

/// A single excitation $`i \to a`$ taking a source string to `addr` with a fermionic phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExcitationRecord {
    addr: u32,
    i: u16,
    a: u16,
    sign: i8,
}

impl ExcitationRecord {
    /// The annihilated orbital.
    pub fn i(&self) -> usize {
        usize::from(self.i)
    }

    /// The created orbital.
    pub fn a(&self) -> usize {
        usize::from(self.a)
    }

    /// The destination string address.
    pub fn addr(&self) -> usize {
        self.addr as usize
    }

    /// The fermionic phase, either `+1` or `-1`.
    pub fn sign(&self) -> i8 {
        self.sign
    }

    /// The fermionic phase as a floating-point factor.
    pub fn phase(&self) -> f64 {
        f64::from(self.sign)
    }

    /// The orbital-pair index $`i n_{\mathrm{orb}} + a`$ used to address T1 intermediates and
    /// raw density-matrix accumulators.
    pub fn pair_index(&self, norb: usize) -> usize {
        self.i() * norb + self.a()
    }
}

/// Excitation records of a whole string space, grouped per source string.
#[derive(Clone, Debug)]
pub struct CompactLinkTable {
    norb: usize,
    nstr: usize,
    nlink: usize,
    records: Vec<ExcitationRecord>,
}

impl CompactLinkTable {
    /// The number of orbitals the records refer to.
    pub fn norb(&self) -> usize {
        self.norb
    }

    /// The number of source strings.
    pub fn nstr(&self) -> usize {
        self.nstr
    }

    /// The number of records per string.
    pub fn nlink(&self) -> usize {
        self.nlink
    }

    /// Returns the excitation records of string `str_id`.
    ///
    /// # Panics
    ///
    /// Panics if `str_id` is not a valid string address.
    pub fn excitations(&self, str_id: usize) -> &[ExcitationRecord] {
        &self.records[str_id * self.nlink..(str_id + 1) * self.nlink]
    }

    /// Returns all records, grouped per string.
    pub fn records(&self) -> &[ExcitationRecord] {
        &self.records
    }
}

// =========
// Functions
// =========

/// Packs a flat link index into a [`CompactLinkTable`].
///
/// # Arguments
///
/// * `link_index` - Flat `(a, i, destination, sign)` quadruples, `nlink` per string.
/// * `norb` - Number of orbitals.
/// * `nstr` - Number of strings.
/// * `nlink` - Number of records per string.
///
/// # Errors
///
/// Fails with [`RdmError::ContractViolation`] if the length of `link_index` is inconsistent with
/// `nstr` and `nlink`, if an orbital index lies outside `[0, norb)`, if a destination lies
/// outside `[0, nstr)`, or if a sign is not $`\pm 1`$.
pub fn compact_links(
    link_index: &[i32],
    norb: usize,
    nstr: usize,
    nlink: usize,
) -> Result<CompactLinkTable, anyhow::Error> {
    let expected_len = nstr
        .checked_mul(nlink)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            RdmError::ContractViolation(format!(
                "link index dimensions overflow: {nstr} strings × {nlink} links"
            ))
        })?;
    ensure!(
        link_index.len() == expected_len,
        RdmError::ContractViolation(format!(
            "link index has {} entries, but {nstr} strings × {nlink} links × 4 = {expected_len} are required",
            link_index.len()
        ))
    );
    ensure!(
        norb <= usize::from(u16::MAX) + 1,
        RdmError::ContractViolation(format!("{norb} orbitals cannot be addressed"))
    );
    ensure!(
        u32::try_from(nstr).is_ok(),
        RdmError::ContractViolation(format!("{nstr} strings cannot be addressed"))
    );

    let records = link_index
        .chunks_exact(4)
        .enumerate()
        .map(|(n, quad)| {
            let (str0, j) = (n / nlink.max(1), n % nlink.max(1));
            pack_record(quad, norb, nstr).map_err(|msg| {
                RdmError::ContractViolation(format!("string {str0}, link {j}: {msg}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompactLinkTable {
        norb,
        nstr,
        nlink,
        records,
    })
}

/// Validates one `(a, i, destination, sign)` quadruple and packs it.
fn pack_record(quad: &[i32], norb: usize, nstr: usize) -> Result<ExcitationRecord, String> {
    let (a, i, addr, sign) = (quad[0], quad[1], quad[2], quad[3]);
    let orbital = |p: i32, label: &str| {
        usize::try_from(p)
            .ok()
            .filter(|&p| p < norb)
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| format!("{label} orbital {p} outside [0, {norb})"))
    };
    let a = orbital(a, "created")?;
    let i = orbital(i, "annihilated")?;
    let addr = usize::try_from(addr)
        .ok()
        .filter(|&addr| addr < nstr)
        .and_then(|addr| u32::try_from(addr).ok())
        .ok_or_else(|| format!("destination {addr} outside [0, {nstr})"))?;
    let sign = match sign {
        1 => 1,
        -1 => -1,
        _ => return Err(format!("sign {sign} is not ±1")),
    };
    Ok(ExcitationRecord { addr, i, a, sign })
}
