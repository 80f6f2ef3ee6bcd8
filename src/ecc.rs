//! Reed-Solomon product-code parity for Mode 2 Form 1 sectors.
//!
//! The protected region runs from the 4-byte sector address at offset 12 up
//! to and including the EDC, with the address bytes treated as zero as
//! required for CD-ROM XA. The P code is an RS(26,24) over the 43-row
//! column grid, the Q code an RS(45,43) over the diagonals, both over
//! GF(256) with the primitive polynomial `0x11D` and the generator
//! `(x + 1)(x + alpha)`.

const GF_POLY: u32 = 0x11d;

/// Multiplication by alpha (the polynomial `x`) in GF(256)
static GF_F: [u8; 256] = build_f();

/// Division by `alpha + 1`: `GF_B[x ^ GF_F[x]] == x`
static GF_B: [u8; 256] = build_b();

const fn build_f() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let shifted = (i as u32) << 1;
        table[i] = (shifted ^ if i & 0x80 != 0 { GF_POLY } else { 0 }) as u8;
        i += 1;
    }

    table
}

const fn build_b() -> [u8; 256] {
    let f = build_f();
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        table[i ^ f[i] as usize] = i as u8;
        i += 1;
    }

    table
}

/// Geometry of one of the two parity codes. `major_count` codewords are
/// computed per byte plane; each visits `minor_count` source bytes starting
/// at `(major >> 1) * major_mult + (major & 1)` and stepping by `minor_inc`
/// modulo the code's source size.
struct Code {
    major_count: usize,
    minor_count: usize,
    major_mult: usize,
    minor_inc: usize,
    dest: usize,
}

const P_CODE: Code = Code {
    major_count: 86,
    minor_count: 24,
    major_mult: 2,
    minor_inc: 86,
    dest: 2076,
};

const Q_CODE: Code = Code {
    major_count: 52,
    minor_count: 43,
    major_mult: 86,
    minor_inc: 88,
    dest: 2248,
};

fn compute_code(sector: &mut [u8; 2352], code: &Code) {
    let size = code.major_count * code.minor_count;

    for major in 0..code.major_count {
        let mut index = (major >> 1) * code.major_mult + (major & 1);
        let mut ecc_a = 0u8;
        let mut ecc_b = 0u8;

        for _ in 0..code.minor_count {
            let byte = sector[12 + index];

            index += code.minor_inc;
            if index >= size {
                index -= size;
            }

            ecc_a ^= byte;
            ecc_b ^= byte;
            ecc_a = GF_F[ecc_a as usize];
        }

        ecc_a = GF_B[(GF_F[ecc_a as usize] ^ ecc_b) as usize];

        sector[code.dest + major] = ecc_a;
        sector[code.dest + code.major_count + major] = ecc_a ^ ecc_b;
    }
}

/// Fill in the P parity at 2076..2248 and the Q parity at 2248..2352. The
/// sub-header, payload and EDC must already be in place; the Q code also
/// covers the freshly computed P bytes.
pub fn generate(sector: &mut [u8; 2352]) {
    // The sector address is not part of the XA pre-image
    let address = [sector[12], sector[13], sector[14], sector[15]];
    sector[12..16].fill(0);

    compute_code(sector, &P_CODE);
    compute_code(sector, &Q_CODE);

    sector[12..16].copy_from_slice(&address);
}
