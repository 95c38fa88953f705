//! RSA, host-key *verification* only (`DESIGN.md` Open Question 4):
//! PKCS#1 v1.5 signature verification for `ssh-rsa` and
//! `rsa-sha2-256` host keys. No signing, no client-authentication use
//! — `auth.rs` only ever signs with Ed25519.

use super::sha256::sha256;
use super::sha1::sha1;

/// An RSA public key as raw big-endian byte strings, as carried on the
/// wire in an `ssh-rsa` host key blob (§6.4). Arbitrary width, so
/// arithmetic here cannot reuse the fixed-256-bit `bignum` module;
/// keys this size need general big-integer support.
pub struct RsaPublicKey {
    pub e: Vec<u8>,
    pub n: Vec<u8>,
}

/// A minimal variable-width non-negative integer, big-endian limbs of
/// 32 bits, used only for RSA modular exponentiation. Distinct from
/// [`super::bignum::U256`], which is fixed at 256 bits for Ed25519;
/// RSA moduli here run to 2048+ bits.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct BigUint(Vec<u32>); // little-endian limbs, no trailing zero limbs

impl BigUint {
    fn from_be_bytes(bytes: &[u8]) -> Self {
        let mut limbs = Vec::new();
        let mut chunk = [0u8; 4];
        let mut i = bytes.len();
        while i > 0 {
            let start = i.saturating_sub(4);
            let slice = &bytes[start..i];
            chunk = [0u8; 4];
            chunk[4 - slice.len()..].copy_from_slice(slice);
            limbs.push(u32::from_be_bytes(chunk));
            i = start;
        }
        let mut v = BigUint(limbs);
        v.trim();
        v
    }

    fn to_be_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() * 4);
        for limb in self.0.iter().rev() {
            out.extend_from_slice(&limb.to_be_bytes());
        }
        while out.len() > 1 && out[0] == 0 {
            out.remove(0);
        }
        out
    }

    fn trim(&mut self) {
        while self.0.last() == Some(&0) {
            self.0.pop();
        }
    }

    fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    fn bit_len(&self) -> usize {
        match self.0.last() {
            None => 0,
            Some(top) => (self.0.len() - 1) * 32 + (32 - top.leading_zeros() as usize),
        }
    }

    fn bit(&self, i: usize) -> bool {
        let limb = i / 32;
        if limb >= self.0.len() {
            return false;
        }
        (self.0[limb] >> (i % 32)) & 1 == 1
    }

    fn cmp_mag(&self, other: &BigUint) -> std::cmp::Ordering {
        if self.0.len() != other.0.len() {
            return self.0.len().cmp(&other.0.len());
        }
        for i in (0..self.0.len()).rev() {
            let ord = self.0[i].cmp(&other.0[i]);
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    }

    fn sub(&self, other: &BigUint) -> BigUint {
        let mut out = vec![0u32; self.0.len()];
        let mut borrow = 0i64;
        for i in 0..self.0.len() {
            let b = *other.0.get(i).unwrap_or(&0) as i64;
            let mut diff = self.0[i] as i64 - b - borrow;
            if diff < 0 {
                diff += 1 << 32;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out[i] = diff as u32;
        }
        let mut v = BigUint(out);
        v.trim();
        v
    }

    fn mul(&self, other: &BigUint) -> BigUint {
        if self.is_zero() || other.is_zero() {
            return BigUint(vec![]);
        }
        let mut out = vec![0u64; self.0.len() + other.0.len()];
        for (i, &a) in self.0.iter().enumerate() {
            let mut carry = 0u64;
            for (j, &b) in other.0.iter().enumerate() {
                let product = a as u64 * b as u64 + out[i + j] + carry;
                out[i + j] = product & 0xFFFF_FFFF;
                carry = product >> 32;
            }
            out[i + other.0.len()] += carry;
        }
        let mut v = BigUint(out.into_iter().map(|x| x as u32).collect());
        v.trim();
        v
    }

    /// `self mod modulus` via repeated shift-and-subtract.
    fn rem(&self, modulus: &BigUint) -> BigUint {
        if self.cmp_mag(modulus) == std::cmp::Ordering::Less {
            return self.clone();
        }
        let shift = self.bit_len().saturating_sub(modulus.bit_len());
        let mut rem = self.clone();
        let mut shifted = modulus.shl(shift);
        let mut bit = shift as isize;
        while bit >= 0 {
            if rem.cmp_mag(&shifted) != std::cmp::Ordering::Less {
                rem = rem.sub(&shifted);
            }
            shifted = shifted.shr1();
            bit -= 1;
        }
        rem
    }

    fn shl(&self, bits: usize) -> BigUint {
        let limb_shift = bits / 32;
        let bit_shift = bits % 32;
        let mut out = vec![0u32; self.0.len() + limb_shift + 1];
        for (i, &limb) in self.0.iter().enumerate() {
            let value = (limb as u64) << bit_shift;
            out[i + limb_shift] |= value as u32;
            out[i + limb_shift + 1] |= (value >> 32) as u32;
        }
        let mut v = BigUint(out);
        v.trim();
        v
    }

    fn shr1(&self) -> BigUint {
        let mut out = vec![0u32; self.0.len()];
        let mut carry = 0u32;
        for i in (0..self.0.len()).rev() {
            out[i] = (self.0[i] >> 1) | (carry << 31);
            carry = self.0[i] & 1;
        }
        let mut v = BigUint(out);
        v.trim();
        v
    }

    /// `base^exp mod modulus`, MSB-down square-and-multiply.
    fn pow_mod(&self, exp: &BigUint, modulus: &BigUint) -> BigUint {
        let mut result = BigUint(vec![1]);
        let bits = exp.bit_len();
        if bits == 0 {
            return result;
        }
        for i in (0..bits).rev() {
            result = result.mul(&result).rem(modulus);
            if exp.bit(i) {
                result = result.mul(self).rem(modulus);
            }
        }
        result
    }
}

/// PKCS#1 v1.5 DigestInfo DER prefix for SHA-1 (RFC 3447 §9.2 note 1).
const SHA1_DIGEST_INFO_PREFIX: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];

/// PKCS#1 v1.5 DigestInfo DER prefix for SHA-256.
const SHA256_DIGEST_INFO_PREFIX: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05,
    0x00, 0x04, 0x20,
];

#[derive(Clone, Copy)]
pub enum RsaHash {
    Sha1,
    Sha256,
}

/// Verifies a PKCS#1 v1.5 RSA signature over `message` under `key`,
/// as used by the `ssh-rsa` / `rsa-sha2-256` host-key algorithms.
pub fn verify(key: &RsaPublicKey, hash: RsaHash, message: &[u8], signature: &[u8]) -> bool {
    let n = BigUint::from_be_bytes(&key.n);
    let e = BigUint::from_be_bytes(&key.e);
    let sig = BigUint::from_be_bytes(signature);
    if sig.cmp_mag(&n) != std::cmp::Ordering::Less {
        return false;
    }

    let k = key.n.len().max((n.bit_len() + 7) / 8);
    let encoded = sig.pow_mod(&e, &n).to_be_bytes();
    let mut em = vec![0u8; k];
    em[k - encoded.len()..].copy_from_slice(&encoded);

    let (prefix, digest): (&[u8], Vec<u8>) = match hash {
        RsaHash::Sha1 => (&SHA1_DIGEST_INFO_PREFIX, sha1(message).to_vec()),
        RsaHash::Sha256 => (&SHA256_DIGEST_INFO_PREFIX, sha256(message).to_vec()),
    };
    let mut expected_suffix = prefix.to_vec();
    expected_suffix.extend_from_slice(&digest);

    let ps_len = k.saturating_sub(3 + expected_suffix.len());
    if em.len() < 3 + ps_len + expected_suffix.len() {
        return false;
    }
    let mut expected_em = Vec::with_capacity(k);
    expected_em.push(0x00);
    expected_em.push(0x01);
    expected_em.extend(std::iter::repeat(0xff).take(ps_len));
    expected_em.push(0x00);
    expected_em.extend_from_slice(&expected_suffix);

    em == expected_em
}

/// Marker kept to document that RSA *signing* is intentionally absent
/// (`DESIGN.md` Open Question 4); calling into this module for
/// client-authentication signatures is a programmer error, not a
/// protocol condition.
pub fn signing_unsupported() -> &'static str {
    "RSA client-authentication signing is not implemented"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biguint_pow_mod_matches_known_modular_exponentiation() {
        // 4^13 mod 497 = 445 (textbook modular-exponentiation example).
        let base = BigUint::from_be_bytes(&[4]);
        let exp = BigUint::from_be_bytes(&[13]);
        let modulus = BigUint::from_be_bytes(&[497]);
        let result = base.pow_mod(&exp, &modulus);
        assert_eq!(result.to_be_bytes(), vec![445u8]);
    }

    #[test]
    fn rejects_signature_that_does_not_decode_to_expected_digest_info() {
        let key = RsaPublicKey {
            e: vec![0x01, 0x00, 0x01],
            n: vec![0xff; 128],
        };
        let signature = vec![0u8; 128];
        assert!(!verify(&key, RsaHash::Sha256, b"hello", &signature));
    }
}
