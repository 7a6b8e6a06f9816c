//! Wide fixed-point accumulator arithmetic.
//!
//! Products of two fp32 operands are accumulated in a 284-bit signed
//! fixed-point register so that reductions stay exact (and therefore
//! associative) over the full fp32 exponent range. The layout is:
//!
//! ```text
//! bit 283                                                      bit 0
//! +------+----------------------------------+----------+-----------+
//! | sign |  256 bits of exponent range      | 23 bits  |  (guard)  |
//! +------+----------------------------------+----------+-----------+
//!    1               2^EXP_WIDTH               mantissa   4 overflow
//! ```
//!
//! with bit `MANT_WIDTH` of the least significant limb carrying weight
//! 2^0. The register is stored as five little-endian 64-bit limbs; the
//! 36 bits above bit 283 are kept as a sign extension of bit 283 so the
//! whole 320-bit image reads as an ordinary two's complement number.
//!
//! The hardware implements this register in partial carry-save form.
//! The emulation collapses that to plain limbwise binary arithmetic,
//! which is bit-equivalent once carries are resolved.

use crate::fp32;

/// Number of 64-bit limbs backing the accumulator.
pub const N_LIMBS: usize = 5;

/// Guard bits above the exponent range that absorb accumulation carries.
pub const OVERFLOW_GUARD_BITS: u32 = 4;

/// Number of discrete exponent weights the register can hold.
pub const EXP_RANGE: i32 = 1 << fp32::EXP_WIDTH;

/// Total significant width: sign + range + mantissa + guard.
pub const ACCU_WIDTH: u32 = 1 + (1 << fp32::EXP_WIDTH) + fp32::MANT_WIDTH + OVERFLOW_GUARD_BITS;

/// Width of the product mantissa delivered by the multiplier (2.46 format).
const PRODUCT_MANT_WIDTH: u32 = 2 + 2 * fp32::MANT_WIDTH;

/// 284-bit signed fixed-point accumulator.
///
/// Limb 0 is least significant. After every [`Accu::wrapping_add`] and
/// [`Accu::negated`] the unused top bits of limb 4 are a sign extension
/// of bit 283, so the sign can always be read from bit 63 of limb 4.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accu {
    limbs: [u64; N_LIMBS],
}

impl Accu {
    /// The zero accumulator.
    #[inline]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Reset to zero.
    #[inline]
    pub fn clear(&mut self) {
        self.limbs = [0; N_LIMBS];
    }

    /// Raw limb access (limb 0 least significant).
    #[inline]
    pub fn limbs(&self) -> &[u64; N_LIMBS] {
        &self.limbs
    }

    /// Sign of the accumulated value.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.limbs[N_LIMBS - 1] >> 63 != 0
    }

    /// Two's complement negation across all limbs.
    pub fn negated(&self) -> Self {
        let mut out = [0u64; N_LIMBS];
        let mut carry = 1u64;
        for (dst, src) in out.iter_mut().zip(self.limbs.iter()) {
            let (sum, overflow) = (!src).overflowing_add(carry);
            *dst = sum;
            carry = overflow as u64;
        }
        Self { limbs: out }
    }

    /// Limbwise addition with carry propagation.
    ///
    /// Carries that escape past the guard bits are discarded exactly as
    /// in hardware: the bits of limb 4 above bit `ACCU_WIDTH % 64` are
    /// replaced with a sign extension of the topmost significant bit, so
    /// an overflow past the guard range wraps instead of widening.
    pub fn wrapping_add(&self, other: &Self) -> Self {
        let mut out = [0u64; N_LIMBS];
        let mut carry = 0u64;
        for k in 0..N_LIMBS {
            let (sum, c1) = self.limbs[k].overflowing_add(other.limbs[k]);
            let (sum, c2) = sum.overflowing_add(carry);
            out[k] = sum;
            carry = (c1 | c2) as u64;
        }

        let clamp = 64 - (ACCU_WIDTH % 64);
        out[N_LIMBS - 1] = (((out[N_LIMBS - 1] << clamp) as i64) >> clamp) as u64;

        Self { limbs: out }
    }

    /// Place an extended multiplier output into the accumulator.
    ///
    /// `mant` is the up-to-48-bit integer product of two 24-bit full
    /// mantissas; `exp` is the biased exponent sum of the operands minus
    /// the bias, i.e. the would-be biased exponent of the product before
    /// normalization. Exponents below the register's weight range give
    /// zero; exponents at or above [`EXP_RANGE`] saturate to a single
    /// bit at the top of the range.
    pub fn from_product(sign: bool, exp: i32, mant: u64) -> Self {
        let mut out = Self::zero();

        let mut exp = exp;
        let mut mant = mant;
        if exp < 0 {
            return out;
        }
        if exp >= EXP_RANGE {
            exp = EXP_RANGE;
            mant = 1u64 << (2 * fp32::MANT_WIDTH);
        }

        let shift = exp - fp32::MANT_WIDTH as i32;
        if shift < 0 {
            // the low 23 weights fall off the bottom of the register
            out.limbs[0] = mant >> (-shift) as u32;
        } else {
            let limb = (shift >> 6) as usize;
            let shift = (shift & 0x3F) as u32;
            out.limbs[limb] = mant << shift;
            if shift + PRODUCT_MANT_WIDTH > 64 {
                out.limbs[limb + 1] = mant >> (64 - shift);
            }
        }

        if sign {
            out = out.negated();
        }
        out
    }

    /// Convert an fp32 word to accumulator representation.
    pub fn from_fp32(word: u32) -> Self {
        let mant = if fp32::is_zero(word) {
            0
        } else {
            // align with the multiplier output format (2.46)
            (fp32::mantissa_full(word) as u64) << fp32::MANT_WIDTH
        };
        Self::from_product(fp32::sign(word), fp32::biased_exp(word), mant)
    }

    /// Normalize back to an fp32 word, truncating excess mantissa bits.
    ///
    /// Values whose leading bit falls below weight 2^-23 collapse to a
    /// signed zero; values at or above weight 2^(EXP_RANGE - 23) produce
    /// a signed infinity.
    pub fn to_fp32(&self) -> u32 {
        let mut out = 0u32;
        let magnitude = if self.is_negative() {
            out = fp32::SIGN_MASK;
            self.negated()
        } else {
            *self
        };

        // weighted exponent of the most significant set bit
        let mut exp = (N_LIMBS as i32) * 64 - fp32::MANT_WIDTH as i32 - 1;
        let mut lead = 0i32;
        let mut top = 0usize;
        for k in (0..N_LIMBS).rev() {
            top = k;
            if magnitude.limbs[k] != 0 {
                lead = magnitude.limbs[k].leading_zeros() as i32;
                exp -= lead;
                break;
            }
            exp -= 64;
        }

        if exp < 0 {
            return out;
        }
        if exp >= EXP_RANGE {
            return out | fp32::INF_BITS;
        }

        out |= (exp as u32) << fp32::MANT_WIDTH;

        // bits left in this limb below the leading one
        let cut = 64 - 1 - fp32::MANT_WIDTH as i32 - lead;
        if cut >= 0 {
            out |= (magnitude.limbs[top] >> cut) as u32 & fp32::MANT_MASK;
        } else {
            // mantissa window straddles two limbs
            out |= (magnitude.limbs[top] << -cut) as u32 & fp32::MANT_MASK;
            out |= (magnitude.limbs[top - 1] >> (64 + cut)) as u32;
        }
        out
    }

    /// Fused multiply-accumulate, the sole arithmetic primitive of the
    /// datapath.
    ///
    /// Multiplies `op_a` by `op_b` exactly (48-bit mantissa product),
    /// optionally flips the product sign (`subtract`), converts to
    /// accumulator format, and either overwrites the register
    /// (`overwrite`) or adds to it. `mac(x, 1.0, true, false)` loads a
    /// value, `mac(x, y, false, s)` accumulates a signed product.
    pub fn mac(&mut self, op_a: u32, op_b: u32, overwrite: bool, subtract: bool) {
        let mut exp = fp32::biased_exp(op_a) + fp32::biased_exp(op_b) - fp32::BIAS;
        let mut mant = fp32::mantissa_full(op_a) as u64 * fp32::mantissa_full(op_b) as u64;
        let sign = fp32::sign(op_a) ^ fp32::sign(op_b);

        if fp32::is_zero(op_a) || fp32::is_zero(op_b) {
            mant = 0;
            exp = 0;
        }

        let product = Self::from_product(sign ^ subtract, exp, mant);
        if overwrite {
            *self = product;
        } else {
            *self = self.wrapping_add(&product);
        }
    }
}
