//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! RSA key loading, RSA-SHA256 signing, and the digest/fingerprint helpers
//! the signing and federation paths need.
//!
//! This crate signs with the `rsa` crate rather than openssl: PKCS#1 and
//! plain or passphrase-encrypted PKCS#8 PEM are all handled through
//! `pkcs8`/`rsa`'s own decoders, with no FFI dependency.

use base64ct::{Base64, Encoding};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{cred_err, NoSQLError};

/// Bits used for every ephemeral keypair generated by a principal provider.
pub const SESSION_KEY_BITS: usize = 2048;

/// Load an RSA private key from PEM bytes, trying plain PKCS#8, then
/// passphrase-encrypted PKCS#8 (if a passphrase is supplied), then PKCS#1.
pub fn load_private_key_pem(pem: &str, passphrase: Option<&[u8]>) -> Result<RsaPrivateKey, NoSQLError> {
    if let Some(pass) = passphrase {
        let pass_str = std::str::from_utf8(pass)
            .map_err(|e| NoSQLError::new(crate::error::NoSQLErrorCode::CredentialsError, &format!("passphrase is not valid UTF-8: {}", e)))?;
        return RsaPrivateKey::from_pkcs8_encrypted_pem(pem, pass_str)
            .map_err(|e| NoSQLError::new(crate::error::NoSQLErrorCode::CredentialsError, &format!("error decrypting private key: {}", e)));
    }
    if let Ok(k) = RsaPrivateKey::from_pkcs8_pem(pem) {
        return Ok(k);
    }
    RsaPrivateKey::from_pkcs1_pem(pem)
        .map_err(|e| NoSQLError::new(crate::error::NoSQLErrorCode::CredentialsError, &format!("error parsing private key PEM: {}", e)))
}

/// Sign `data` with PKCS#1v1.5-SHA256, returning the raw signature bytes.
pub fn sign_sha256(key: &RsaPrivateKey, data: &[u8]) -> Vec<u8> {
    let signing_key = SigningKey::<Sha256>::new(key.clone());
    signing_key.sign(data).to_vec()
}

/// Sign `data` and base64-encode the result, as embedded in a Signature header.
pub fn sign_sha256_base64(key: &RsaPrivateKey, data: &[u8]) -> String {
    Base64::encode_string(&sign_sha256(key, data))
}

/// SHA-256 digest of `data`, base64-encoded (the `x-content-sha256` value).
pub fn sha256_base64(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Base64::encode_string(&hasher.finalize())
}

/// SHA-1 fingerprint of DER bytes, formatted as colon-separated uppercase hex.
pub fn sha1_fingerprint_colon_hex(der: &[u8]) -> String {
    use sha1::Sha1;
    let mut hasher = Sha1::new();
    hasher.update(der);
    let digest = hasher.finalize();
    digest
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Generate a fresh in-memory RSA-2048 keypair, used by the principal-based
/// providers on every security-token refresh.
pub fn generate_session_keypair() -> Result<(RsaPrivateKey, RsaPublicKey), NoSQLError> {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, SESSION_KEY_BITS)
        .map_err(|e| NoSQLError::new(crate::error::NoSQLErrorCode::IllegalState, &format!("error generating RSA keypair: {}", e)))?;
    let public = RsaPublicKey::from(&private);
    Ok((private, public))
}

/// DER bytes of the SubjectPublicKeyInfo for a public key, base64-encoded,
/// as embedded in the federation/OKE request bodies.
pub fn public_key_spki_der_base64(key: &RsaPublicKey) -> Result<String, NoSQLError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| NoSQLError::new(crate::error::NoSQLErrorCode::IllegalState, &format!("error encoding public key: {}", e)))?;
    Ok(Base64::encode_string(der.as_bytes()))
}

/// Strip PEM armor and newlines from a certificate or public key, leaving
/// the bare base64 DER body used inline in federation/OKE JSON bodies.
pub fn strip_pem_armor(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("")
}

/// Base64-decode a stripped PEM body into its DER bytes.
pub fn pem_body_to_der(pem: &str) -> Result<Vec<u8>, NoSQLError> {
    let stripped = strip_pem_armor(pem);
    Base64::decode_vec(&stripped)
        .map_err(|e| cred_err!("error decoding certificate PEM: {}", e).unwrap_err())
}
