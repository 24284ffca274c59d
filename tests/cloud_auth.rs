// Direct user-identity cloud signing, exercised end to end through the
// facade: build an `Authorization` from inline tenancy/user/fingerprint/key
// values, ask for headers, and check the signature verifies against the
// same key -- the clean-path scenario for cloud credentials.

use base64ct::{Base64, Encoding};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::signature::Verifier;
use rsa::RsaPrivateKey;
use sha2::Sha256;

use oracle_nosql_rust_auth::{Authorization, ValueSource};

fn signing_content(headers: &str, method: &str, path: &str, host: &str, date: &str) -> String {
    headers
        .split(' ')
        .map(|h| match h {
            "(request-target)" => format!("(request-target): {} {}", method.to_lowercase(), path),
            "host" => format!("host: {}", host),
            "date" => format!("date: {}", date),
            other => panic!("unexpected header in test: {}", other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_direct_identity_produces_verifiable_signature() {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();

    let auth = Authorization::builder()
        .cloud_auth_from_values(
            "ocid1.tenancy.oc1..aaaa",
            "ocid1.user.oc1..bbbb",
            "aa:bb:cc:dd",
            ValueSource::Inline(pem),
            None,
        )
        .unwrap()
        .cloud_region("us-ashburn-1")
        .unwrap()
        .build()
        .await
        .unwrap();

    let headers = auth.get_authorization("GET", "/V2/nosql/data", None).await.unwrap();
    let auth_header = headers.get("authorization").unwrap().to_str().unwrap().to_string();
    let date = headers.get("date").unwrap().to_str().unwrap().to_string();

    assert!(auth_header.starts_with("Signature "));
    assert!(auth_header.contains(r#"keyId="ocid1.tenancy.oc1..aaaa/ocid1.user.oc1..bbbb/aa:bb:cc:dd""#));
    assert!(auth_header.contains(r#"headers="(request-target) host date""#));
    assert_eq!(
        headers.get("x-nosql-compartment-id").unwrap(),
        "ocid1.tenancy.oc1..aaaa",
    );

    let sig_b64 = auth_header
        .split("signature=\"")
        .nth(1)
        .and_then(|s| s.split('"').next())
        .expect("signature field present");
    let sig_bytes = Base64::decode_vec(sig_b64).unwrap();
    let signature = Signature::try_from(sig_bytes.as_slice()).unwrap();

    let content = signing_content(
        "(request-target) host date",
        "GET",
        "/V2/nosql/data",
        "nosql.us-ashburn-1.oci.oraclecloud.com",
        &date,
    );
    let verifying_key = VerifyingKey::<Sha256>::new(key.to_public_key());
    verifying_key.verify(content.as_bytes(), &signature).expect("signature must verify against the signing key");

    auth.close().await;
}
