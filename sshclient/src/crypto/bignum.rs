//! A minimal fixed-width (256-bit) big integer, used only by
//! [`super::ed25519`] for modular arithmetic mod the field prime and
//! mod the group order. Not constant-time: acceptable for signature
//! *verification* over public values, unlike the scalar/point
//! operations in [`super::x25519`], which do need to be.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U256(pub [u64; 4]);

impl U256 {
    pub const ZERO: U256 = U256([0, 0, 0, 0]);
    pub const ONE: U256 = U256([1, 0, 0, 0]);

    pub fn from_bytes_le(bytes: &[u8; 32]) -> U256 {
        let mut limbs = [0u64; 4];
        for i in 0..4 {
            limbs[i] = u64::from_le_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap());
        }
        U256(limbs)
    }

    pub fn to_bytes_le(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for i in 0..4 {
            out[i * 8..i * 8 + 8].copy_from_slice(&self.0[i].to_le_bytes());
        }
        out
    }

    pub fn from_u64(v: u64) -> U256 {
        U256([v, 0, 0, 0])
    }

    pub fn from_decimal(s: &str) -> U256 {
        let mut acc = U256::ZERO;
        let ten = U256::from_u64(10);
        for c in s.chars() {
            let digit = c.to_digit(10).expect("non-decimal digit") as u64;
            acc = mul_u256_small(acc, ten).0;
            acc = add_raw(acc, U256::from_u64(digit)).0;
        }
        acc
    }

    pub fn is_zero(self) -> bool {
        self.0 == [0, 0, 0, 0]
    }

    pub fn bit(self, i: usize) -> bool {
        (self.0[i / 64] >> (i % 64)) & 1 == 1
    }

    pub fn cmp(self, other: U256) -> std::cmp::Ordering {
        for i in (0..4).rev() {
            let ord = self.0[i].cmp(&other.0[i]);
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    }
}

/// Adds without reducing; returns `(sum, carry)`.
pub fn add_raw(a: U256, b: U256) -> (U256, bool) {
    let mut out = [0u64; 4];
    let mut carry = false;
    for i in 0..4 {
        let (s1, o1) = a.0[i].overflowing_add(b.0[i]);
        let (s2, o2) = s1.overflowing_add(carry as u64);
        out[i] = s2;
        carry = o1 || o2;
    }
    (U256(out), carry)
}

/// Subtracts without reducing; returns `(difference, borrow)`.
pub fn sub_raw(a: U256, b: U256) -> (U256, bool) {
    let mut out = [0u64; 4];
    let mut borrow = false;
    for i in 0..4 {
        let (d1, b1) = a.0[i].overflowing_sub(b.0[i]);
        let (d2, b2) = d1.overflowing_sub(borrow as u64);
        out[i] = d2;
        borrow = b1 || b2;
    }
    (U256(out), borrow)
}

fn mul_u256_small(a: U256, b: U256) -> (U256, [u64; 4]) {
    // Only used by `from_decimal`, where `b` is always `10` and the
    // product never needs the high half; kept general for clarity.
    let wide = mul_wide(a, b);
    (U256([wide[0], wide[1], wide[2], wide[3]]), [wide[4], wide[5], wide[6], wide[7]])
}

/// Full 256x256 -> 512-bit schoolbook multiply.
pub fn mul_wide(a: U256, b: U256) -> [u64; 8] {
    let mut out = [0u64; 8];
    for i in 0..4 {
        let mut carry: u128 = 0;
        for j in 0..4 {
            let product = (a.0[i] as u128) * (b.0[j] as u128) + (out[i + j] as u128) + carry;
            out[i + j] = product as u64;
            carry = product >> 64;
        }
        out[i + 4] = out[i + 4].wrapping_add(carry as u64);
    }
    out
}

/// Reduces a 512-bit value mod `modulus` via bit-serial long division
/// (correct but not fast; verify is not performance-sensitive here).
pub fn reduce_wide(wide: [u64; 8], modulus: U256) -> U256 {
    let mut rem = U256::ZERO;
    for bit_index in (0..512).rev() {
        let limb = bit_index / 64;
        let bit = (wide[limb] >> (bit_index % 64)) & 1;
        rem = shl1_or(rem, bit == 1);
        if rem.cmp(modulus) != std::cmp::Ordering::Less {
            rem = sub_raw(rem, modulus).0;
        }
    }
    rem
}

fn shl1_or(a: U256, low_bit: bool) -> U256 {
    let mut out = [0u64; 4];
    let mut carry = low_bit as u64;
    for i in 0..4 {
        let new_carry = a.0[i] >> 63;
        out[i] = (a.0[i] << 1) | carry;
        carry = new_carry;
    }
    U256(out)
}

pub fn add_mod(a: U256, b: U256, modulus: U256) -> U256 {
    let (sum, carry) = add_raw(a, b);
    if carry || sum.cmp(modulus) != std::cmp::Ordering::Less {
        sub_raw(sum, modulus).0
    } else {
        sum
    }
}

pub fn sub_mod(a: U256, b: U256, modulus: U256) -> U256 {
    let (diff, borrow) = sub_raw(a, b);
    if borrow {
        add_raw(diff, modulus).0
    } else {
        diff
    }
}

pub fn mul_mod(a: U256, b: U256, modulus: U256) -> U256 {
    reduce_wide(mul_wide(a, b), modulus)
}

/// `base^exp mod modulus`, square-and-multiply from the MSB down.
pub fn pow_mod(base: U256, exp: U256, modulus: U256) -> U256 {
    let mut result = U256::ONE;
    let mut found_one = false;
    for bit_index in (0..256).rev() {
        if found_one {
            result = mul_mod(result, result, modulus);
        }
        if exp.bit(bit_index) {
            found_one = true;
            result = mul_mod(result, base, modulus);
        }
    }
    result
}

/// `1/a mod modulus` via Fermat's little theorem; both moduli this
/// module is used with (the field prime and the group order) are
/// prime.
pub fn inv_mod(a: U256, modulus: U256) -> U256 {
    let two = U256::from_u64(2);
    let exp = sub_raw(modulus, two).0;
    pow_mod(a, exp, modulus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_roundtrip() {
        let v = U256::from_decimal("123456789012345678901234567890");
        let bytes = v.to_bytes_le();
        let back = U256::from_bytes_le(&bytes);
        assert_eq!(v, back);
    }

    #[test]
    fn mod_arithmetic_small() {
        let m = U256::from_u64(97);
        let a = U256::from_u64(50);
        let b = U256::from_u64(60);
        assert_eq!(add_mod(a, b, m), U256::from_u64((50 + 60) % 97));
        assert_eq!(mul_mod(a, b, m), U256::from_u64((50 * 60) % 97));
    }
}
