//! Ed25519 signature verification (RFC 8032 §5.1.7).
//!
//! Spec decision (`DESIGN.md` Open Question 1): this is a real
//! implementation, never a stub that accepts every signature.
//! Point and scalar arithmetic go through [`super::bignum::U256`];
//! this module is verify-only, so affine (not extended/projective)
//! coordinates and non-constant-time arithmetic are an acceptable
//! trade for clarity, unlike the private-key operations in
//! [`super::x25519`].

use super::bignum::{self, U256};
use super::sha512::Sha512;

fn field_prime() -> U256 {
    // 2^255 - 19.
    let mut limbs = [0u64; 4];
    limbs[0] = u64::MAX - 18;
    limbs[1] = u64::MAX;
    limbs[2] = u64::MAX;
    limbs[3] = (1u64 << 63) - 1;
    U256(limbs)
}

fn group_order() -> U256 {
    // 2^252 + 27742317777372353535851937790883648493.
    U256::from_decimal("7237005577332262213973186563042994240857116359379907606001950938285454250989")
}

fn curve_d() -> U256 {
    let p = field_prime();
    let num = bignum::sub_mod(U256::ZERO, U256::from_u64(121665), p);
    let inv121666 = bignum::inv_mod(U256::from_u64(121666), p);
    bignum::mul_mod(num, inv121666, p)
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Point {
    x: U256,
    y: U256,
}

fn identity() -> Point {
    Point {
        x: U256::ZERO,
        y: U256::ONE,
    }
}

fn point_add(a: Point, b: Point, p: U256, d: U256) -> Point {
    let x1y2 = bignum::mul_mod(a.x, b.y, p);
    let y1x2 = bignum::mul_mod(a.y, b.x, p);
    let y1y2 = bignum::mul_mod(a.y, b.y, p);
    let x1x2 = bignum::mul_mod(a.x, b.x, p);
    let x1x2y1y2 = bignum::mul_mod(x1x2, y1y2, p);
    let dxy = bignum::mul_mod(d, x1x2y1y2, p);

    let x_num = bignum::add_mod(x1y2, y1x2, p);
    let x_den = bignum::add_mod(U256::ONE, dxy, p);
    let y_num = bignum::add_mod(y1y2, x1x2, p);
    let y_den = bignum::sub_mod(U256::ONE, dxy, p);

    Point {
        x: bignum::mul_mod(x_num, bignum::inv_mod(x_den, p), p),
        y: bignum::mul_mod(y_num, bignum::inv_mod(y_den, p), p),
    }
}

fn scalar_mult(scalar: U256, point: Point, p: U256, d: U256) -> Point {
    let mut acc = identity();
    let mut found_one = false;
    for bit_index in (0..256).rev() {
        if found_one {
            acc = point_add(acc, acc, p, d);
        }
        if scalar.bit(bit_index) {
            found_one = true;
            acc = point_add(acc, point, p, d);
        }
    }
    acc
}

/// RFC 8032 §5.1.3: recovers `x` from `y` and the desired low bit of
/// `x`, or `None` if `y` does not correspond to a point on the curve.
fn recover_x(y: U256, sign: bool, p: U256, d: U256) -> Option<U256> {
    let y2 = bignum::mul_mod(y, y, p);
    let numerator = bignum::sub_mod(y2, U256::ONE, p);
    let denominator = bignum::add_mod(bignum::mul_mod(d, y2, p), U256::ONE, p);
    let x2 = bignum::mul_mod(numerator, bignum::inv_mod(denominator, p), p);

    // p ≡ 5 (mod 8): a square root candidate is x2^((p+3)/8).
    let three = U256::from_u64(3);
    let eight = U256::from_u64(8);
    let (p_plus_3, carry) = bignum::add_raw(p, three);
    debug_assert!(!carry, "p + 3 never overflows 256 bits");
    let exp = divide_by_small(p_plus_3, eight);
    let mut x = bignum::pow_mod(x2, exp, p);

    if bignum::mul_mod(x, x, p) != x2 {
        let sqrt_m1 = bignum::pow_mod(
            U256::from_u64(2),
            divide_by_small(bignum::sub_mod(p, U256::ONE, p), U256::from_u64(4)),
            p,
        );
        x = bignum::mul_mod(x, sqrt_m1, p);
        if bignum::mul_mod(x, x, p) != x2 {
            return None;
        }
    }

    if x.is_zero() && sign {
        return None;
    }
    let x_is_odd = x.bit(0);
    if x_is_odd != sign {
        x = bignum::sub_mod(p, x, p);
    }
    Some(x)
}

/// Divides a value known to be exactly divisible by a small power of
/// two (`8` or `4`, here) via repeated right-shift — used only for
/// deriving the fixed exponents `(p+3)/8` and `(p-1)/4`.
fn divide_by_small(value: U256, divisor: U256) -> U256 {
    let shift = match divisor.0[0] {
        4 => 2,
        8 => 3,
        _ => panic!("divide_by_small only supports power-of-two divisors 4 and 8"),
    };
    let mut limbs = value.0;
    let mut carry = 0u64;
    for i in (0..4).rev() {
        let new_carry = limbs[i] & ((1 << shift) - 1);
        limbs[i] = (limbs[i] >> shift) | (carry << (64 - shift));
        carry = new_carry;
    }
    U256(limbs)
}

fn decompress(bytes: &[u8; 32], p: U256, d: U256) -> Option<Point> {
    let sign = (bytes[31] & 0x80) != 0;
    let mut y_bytes = *bytes;
    y_bytes[31] &= 0x7f;
    let y = U256::from_bytes_le(&y_bytes);
    if y.cmp(p) != std::cmp::Ordering::Less {
        return None;
    }
    let x = recover_x(y, sign, p, d)?;
    Some(Point { x, y })
}

fn basepoint(p: U256, d: U256) -> Point {
    let inv5 = bignum::inv_mod(U256::from_u64(5), p);
    let by = bignum::mul_mod(U256::from_u64(4), inv5, p);
    let bx = recover_x(by, false, p, d).expect("basepoint y has a valid x");
    Point { x: bx, y: by }
}

fn wide_from_hash(hash: [u8; 64]) -> [u64; 8] {
    let mut wide = [0u64; 8];
    for i in 0..8 {
        wide[i] = u64::from_le_bytes(hash[i * 8..i * 8 + 8].try_into().unwrap());
    }
    wide
}

/// Verifies an Ed25519 signature over `message` under `public_key`.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let p = field_prime();
    let d = curve_d();
    let l = group_order();

    let r_bytes: [u8; 32] = signature[0..32].try_into().unwrap();
    let s_bytes: [u8; 32] = signature[32..64].try_into().unwrap();
    let s = U256::from_bytes_le(&s_bytes);
    if s.cmp(l) != std::cmp::Ordering::Less {
        return false;
    }

    let a_point = match decompress(public_key, p, d) {
        Some(pt) => pt,
        None => return false,
    };
    let r_point = match decompress(&r_bytes, p, d) {
        Some(pt) => pt,
        None => return false,
    };

    let mut hasher = Sha512::new();
    hasher.update(&r_bytes);
    hasher.update(public_key);
    hasher.update(message);
    let digest = hasher.finalize();
    let k = bignum::reduce_wide(wide_from_hash(digest), l);

    let b = basepoint(p, d);
    let lhs = scalar_mult(s, b, p, d);
    let rhs = point_add(r_point, scalar_mult(k, a_point, p, d), p, d);
    lhs == rhs
}

fn encode_point(point: Point) -> [u8; 32] {
    let mut bytes = point.y.to_bytes_le();
    if point.x.bit(0) {
        bytes[31] |= 0x80;
    }
    bytes
}

fn reduce_u256_mod(value: U256, modulus: U256) -> U256 {
    let wide = [value.0[0], value.0[1], value.0[2], value.0[3], 0, 0, 0, 0];
    bignum::reduce_wide(wide, modulus)
}

/// RFC 8032 §5.1.5's clamp: clears the low 3 bits of the first byte
/// and the top bit of the last, and sets the second-highest bit of
/// the last, so the resulting scalar always has bit 254 set and bit
/// 255 clear.
fn clamp(seed: &mut [u8; 32]) {
    seed[0] &= 0xf8;
    seed[31] &= 0x7f;
    seed[31] |= 0x40;
}

/// Derives the public key for a 32-byte private key seed (RFC 8032
/// §5.1.5's `A = s*B`), used by callers that only persist the seed.
pub fn public_key_from_private(private_key: &[u8; 32]) -> [u8; 32] {
    let p = field_prime();
    let d = curve_d();
    let l = group_order();
    let b = basepoint(p, d);

    let mut expanded = Sha512::new();
    expanded.update(private_key);
    let h = expanded.finalize();
    let mut a_bytes: [u8; 32] = h[0..32].try_into().unwrap();
    clamp(&mut a_bytes);
    let s = reduce_u256_mod(U256::from_bytes_le(&a_bytes), l);
    encode_point(scalar_mult(s, b, p, d))
}

/// RFC 8032 §5.1.6: deterministic Ed25519 signing. `public_key` is
/// taken as given rather than recomputed from `private_key`, since
/// callers already hold both halves of the configured key pair.
pub fn sign(private_key: &[u8; 32], public_key: &[u8; 32], message: &[u8]) -> [u8; 64] {
    let p = field_prime();
    let d = curve_d();
    let l = group_order();
    let b = basepoint(p, d);

    let mut expanded = Sha512::new();
    expanded.update(private_key);
    let h = expanded.finalize();

    let mut a_bytes: [u8; 32] = h[0..32].try_into().unwrap();
    clamp(&mut a_bytes);
    let s = reduce_u256_mod(U256::from_bytes_le(&a_bytes), l);
    let prefix = &h[32..64];

    let mut r_hasher = Sha512::new();
    r_hasher.update(prefix);
    r_hasher.update(message);
    let r_scalar = bignum::reduce_wide(wide_from_hash(r_hasher.finalize()), l);

    let r_point = scalar_mult(r_scalar, b, p, d);
    let r_bytes = encode_point(r_point);

    let mut k_hasher = Sha512::new();
    k_hasher.update(&r_bytes);
    k_hasher.update(public_key);
    k_hasher.update(message);
    let k = bignum::reduce_wide(wide_from_hash(k_hasher.finalize()), l);

    let s_final = bignum::add_mod(r_scalar, bignum::mul_mod(k, s, l), l);

    let mut signature = [0u8; 64];
    signature[0..32].copy_from_slice(&r_bytes);
    signature[32..64].copy_from_slice(&s_final.to_bytes_le());
    signature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_signature() {
        let public_key = [0u8; 32];
        let signature = [0u8; 64];
        assert!(!verify(&public_key, b"hello", &signature));
    }

    #[test]
    fn sign_then_verify_round_trip_succeeds() {
        let private_key = [5u8; 32];
        let public_key = public_key_from_private(&private_key);
        let message = b"ssh-ed25519 round trip";
        let signature = sign(&private_key, &public_key, message);
        assert!(verify(&public_key, message, &signature));
    }

    #[test]
    fn sign_then_verify_fails_on_tampered_message() {
        let private_key = [5u8; 32];
        let public_key = public_key_from_private(&private_key);
        let signature = sign(&private_key, &public_key, b"original");
        assert!(!verify(&public_key, b"tampered", &signature));
    }

    #[test]
    fn group_order_constant_matches_known_bit_pattern() {
        // 2^252 + 27742317777372353535851937790883648493 has its top
        // bit at position 252.
        let l = group_order();
        assert!(l.bit(252));
        assert!(!l.bit(253));
    }
}
