//! HMAC (RFC 2104) over SHA-1/SHA-256, the two MACs in the supported
//! matrix (§6.2: `hmac-sha2-256`, `hmac-sha1`).

use super::sha1::Sha1;
use super::sha256::Sha256;

const BLOCK_SIZE: usize = 64;

fn hmac<const OUT: usize>(
    key: &[u8],
    data: &[u8],
    hash: impl Fn(&[u8]) -> Vec<u8>,
    out_len: usize,
) -> [u8; OUT] {
    let mut key_block = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        let hashed = hash(key);
        key_block[..hashed.len()].copy_from_slice(&hashed);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut ipad = [0x36u8; BLOCK_SIZE];
    let mut opad = [0x5cu8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        ipad[i] ^= key_block[i];
        opad[i] ^= key_block[i];
    }

    let mut inner_input = Vec::with_capacity(BLOCK_SIZE + data.len());
    inner_input.extend_from_slice(&ipad);
    inner_input.extend_from_slice(data);
    let inner_hash = hash(&inner_input);

    let mut outer_input = Vec::with_capacity(BLOCK_SIZE + out_len);
    outer_input.extend_from_slice(&opad);
    outer_input.extend_from_slice(&inner_hash);
    let outer_hash = hash(&outer_input);

    let mut out = [0u8; OUT];
    out.copy_from_slice(&outer_hash[..OUT]);
    out
}

pub fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; 20] {
    hmac::<20>(
        key,
        data,
        |d| {
            let mut h = Sha1::new();
            h.update(d);
            h.finalize().to_vec()
        },
        20,
    )
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    hmac::<32>(
        key,
        data,
        |d| {
            let mut h = Sha256::new();
            h.update(d);
            h.finalize().to_vec()
        },
        32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4231_case_1() {
        // RFC 4231 test case 1.
        let key = [0x0bu8; 20];
        let data = b"Hi There";
        let expected = "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7";
        let mac = hmac_sha256(&key, data);
        assert_eq!(hex_of(&mac), expected);
    }

    fn hex_of(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
