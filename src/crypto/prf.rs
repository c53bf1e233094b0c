//! The TLS 1.0/1.1 pseudo-random function (RFC 2246 section 5).
//!
//! ```text
//! PRF(secret, label, seed) = P_MD5(S1, label + seed) XOR P_SHA-1(S2, label + seed)
//! ```
//!
//! S1 and S2 are the first and last halves of the secret. With an odd length
//! they share the middle byte.

use crate::buffer::Buf;
use crate::crypto::HmacProvider;

/// Length of the master secret.
pub const MASTER_SECRET_LEN: usize = 48;

/// Expand `secret` into `output_len` bytes written to `out`.
///
/// The output for a shorter length is always a prefix of the output for a
/// longer one.
pub fn prf_tls10(
    hmac: &dyn HmacProvider,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    if !label.is_ascii() {
        return Err("PRF label must be ASCII".to_string());
    }

    let mut full_seed = Buf::new();
    full_seed.extend_from_slice(label.as_bytes());
    full_seed.extend_from_slice(seed);

    let half = (secret.len() + 1) / 2;
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let mut md5_stream = Buf::new();
    let md5 = |parts: &[&[u8]]| hmac.hmac_md5(s1, parts).map(|h| h.to_vec());
    p_hash(&mut md5_stream, output_len, md5, &full_seed)?;

    let sha1 = |parts: &[&[u8]]| hmac.hmac_sha1(s2, parts).map(|h| h.to_vec());
    p_hash(out, output_len, sha1, &full_seed)?;

    for (o, m) in out.iter_mut().zip(md5_stream.iter()) {
        *o ^= m;
    }

    Ok(())
}

/// P_hash(secret, seed) with the HMAC keyed by the caller.
fn p_hash(
    out: &mut Buf,
    output_len: usize,
    mut hmac: impl FnMut(&[&[u8]]) -> Result<Vec<u8>, String>,
    full_seed: &[u8],
) -> Result<(), String> {
    out.clear();

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a = hmac(&[full_seed])?;

    while out.len() < output_len {
        // HMAC_hash(secret, A(i) + seed)
        let output = hmac(&[a.as_slice(), full_seed])?;

        let remaining = output_len - out.len();
        let to_copy = std::cmp::min(remaining, output.len());
        out.extend_from_slice(&output[..to_copy]);

        if out.len() < output_len {
            a = hmac(&[a.as_slice()])?;
        }
    }

    Ok(())
}

/// master_secret = PRF(pre_master_secret, "master secret", client_random + server_random)
pub fn master_secret(
    hmac: &dyn HmacProvider,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    out: &mut Buf,
) -> Result<(), String> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);
    prf_tls10(
        hmac,
        pre_master_secret,
        "master secret",
        &seed,
        out,
        MASTER_SECRET_LEN,
    )
}

/// key_block = PRF(master_secret, "key expansion", server_random + client_random)
pub fn key_expansion(
    hmac: &dyn HmacProvider,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    out: &mut Buf,
    key_material_length: usize,
) -> Result<(), String> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(server_random);
    seed[32..].copy_from_slice(client_random);
    prf_tls10(
        hmac,
        master_secret,
        "key expansion",
        &seed,
        out,
        key_material_length,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn prf(secret: &[u8], label: &str, seed: &[u8], len: usize) -> Vec<u8> {
        let provider = default_provider();
        let mut out = Buf::new();
        prf_tls10(provider.hmac_provider, secret, label, seed, &mut out, len).unwrap();
        out.into_vec()
    }

    #[test]
    fn known_vector_104_bytes() {
        let out = prf(&[0xab; 48], "PRF Testvector", &[0xcd; 64], 104);
        let expected = hex(
            "d3d4d1e349b5d515044666d51de32bab258cb521b6b053463e354832fd976754\
             443bcf9a296519bc289abcbc1187e4ebd31e602353776c408aafb74cbc85eff6\
             9255f9788faa184cbb957a9819d84a5d7eb006eb459d3ae8de9810454b8b2d8f\
             1afbc655a8c9a013",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn master_secret_vector() {
        let secret: Vec<u8> = (0..48).collect();
        let seed: Vec<u8> = (0..64).collect();
        let out = prf(&secret, "master secret", &seed, 48);
        let expected = hex(
            "539391828d1d131678646180c5bda5c9a2eb62382c8cfb9440545cae85c8c205\
             b93e0d22161e06be1189235aefca7570",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn short_secrets() {
        let out = prf(b"secret", "test label", b"seed", 16);
        assert_eq!(out, hex("a8ef48e934ebf83df2dffe4aa0445a28"));
        // Odd length: both halves include the middle byte.
        let out = prf(b"secre", "test label", b"seed", 16);
        assert_eq!(out, hex("76720f515e0de78022c0155dc9976545"));
    }

    #[test]
    fn prefix_stable() {
        let short = prf(b"key", "label", b"seed", 20);
        let long = prf(b"key", "label", b"seed", 77);
        assert_eq!(&long[..20], &short[..]);
    }

    #[test]
    fn deterministic() {
        assert_eq!(prf(b"k", "l", b"s", 33), prf(b"k", "l", b"s", 33));
    }

    #[test]
    fn master_secret_uses_client_then_server_random() {
        let provider = default_provider();
        let pms = [0x03; 48];
        let cr = [0x11; 32];
        let sr = [0x22; 32];
        let mut out = Buf::new();
        master_secret(provider.hmac_provider, &pms, &cr, &sr, &mut out).unwrap();

        let mut seed = cr.to_vec();
        seed.extend_from_slice(&sr);
        assert_eq!(&out[..], &prf(&pms, "master secret", &seed, 48)[..]);
    }
}
