//! CMS (PKCS#7) detached signatures with an RSA key.
//!
//! [`CmsSigner`] is a ready-made [`ContentSigner`]: RSA PKCS#1 v1.5 over
//! SHA-256, the signer certificate embedded, no encapsulated content.

use super::types::{ContentSigner, SignatureSubFilter};
use crate::error::{Error, Result};
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::signed_data::{EncapsulatedContentInfo, SignerIdentifier};
use der::{Decode, Encode};
use pkcs8::DecodePrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use x509_cert::spki::{AlgorithmIdentifierOwned, ObjectIdentifier};
use x509_cert::Certificate;

/// id-data (RFC 5652)
const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");

/// id-sha256 (RFC 5754)
const ID_SHA_256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");

/// Signs with an RSA private key and its X.509 certificate.
pub struct CmsSigner {
    certificate: Certificate,
    key: SigningKey<Sha256>,
}

impl CmsSigner {
    /// Create a signer from a DER certificate and a PKCS#8 DER RSA key.
    pub fn from_der(certificate: &[u8], private_key: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_der(certificate).map_err(|e| {
            log::warn!("Certificate is not valid DER: {}", e);
            Error::Signing(format!("invalid certificate: {}", e))
        })?;
        let key = RsaPrivateKey::from_pkcs8_der(private_key).map_err(|e| {
            log::warn!("Private key is not a PKCS#8 RSA key: {}", e);
            Error::Signing(format!("invalid private key: {}", e))
        })?;
        Ok(Self {
            certificate,
            key: SigningKey::<Sha256>::new(key),
        })
    }

    /// The signer certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

impl ContentSigner for CmsSigner {
    fn sign(&self, data: &[u8], sub_filter: SignatureSubFilter) -> Result<Vec<u8>> {
        let digest = Sha256::digest(data);
        let digest_algorithm = AlgorithmIdentifierOwned {
            oid: ID_SHA_256,
            parameters: None,
        };
        let content = EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        };
        let signer_id = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: self.certificate.tbs_certificate.issuer.clone(),
            serial_number: self.certificate.tbs_certificate.serial_number.clone(),
        });

        let signer_info = SignerInfoBuilder::new(
            &self.key,
            signer_id,
            digest_algorithm.clone(),
            &content,
            Some(digest.as_slice()),
        )
        .map_err(|e| Error::Signing(e.to_string()))?;

        let signed_data = SignedDataBuilder::new(&content)
            .add_digest_algorithm(digest_algorithm)
            .map_err(|e| Error::Signing(e.to_string()))?
            .add_certificate(CertificateChoices::Certificate(self.certificate.clone()))
            .map_err(|e| Error::Signing(e.to_string()))?
            .add_signer_info::<SigningKey<Sha256>, rsa::pkcs1v15::Signature>(signer_info)
            .map_err(|e| Error::Signing(e.to_string()))?
            .build()
            .map_err(|e| Error::Signing(e.to_string()))?;

        let der = signed_data.to_der().map_err(|e| Error::Signing(e.to_string()))?;
        log::debug!("{} CMS signature: {} bytes over {} signed bytes", sub_filter.as_pdf_name(), der.len(), data.len());
        Ok(der)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms::content_info::ContentInfo;
    use cms::signed_data::SignedData;
    use der::asn1::OctetString;
    use pkcs8::EncodePrivateKey;
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;
    use rsa::RsaPublicKey;
    use std::str::FromStr;
    use std::time::Duration;
    use x509_cert::builder::{Builder, CertificateBuilder, Profile};
    use x509_cert::name::Name;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::SubjectPublicKeyInfoOwned;
    use x509_cert::time::Validity;

    /// id-messageDigest (RFC 5652)
    const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

    /// Fresh RSA key and a self-signed certificate for it, both DER.
    fn test_identity() -> (Vec<u8>, Vec<u8>, RsaPublicKey) {
        let mut rng = rsa::rand_core::OsRng;
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = key.to_public_key();
        let signing_key = SigningKey::<Sha256>::new(key.clone());

        let builder = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::new(&[7]).unwrap(),
            Validity::from_now(Duration::from_secs(3600)).unwrap(),
            Name::from_str("CN=pdf_incremental test").unwrap(),
            SubjectPublicKeyInfoOwned::from_key(public.clone()).unwrap(),
            &signing_key,
        )
        .unwrap();
        let certificate = builder.build::<Signature>().unwrap();

        let key_der = key.to_pkcs8_der().unwrap().as_bytes().to_vec();
        (certificate.to_der().unwrap(), key_der, public)
    }

    #[test]
    fn test_detached_signed_data() {
        let (certificate, key, public) = test_identity();
        let signer = CmsSigner::from_der(&certificate, &key).unwrap();
        let data = b"%PDF-1.7 first range|second range %%EOF";

        let der = signer.sign(data, SignatureSubFilter::Pkcs7Detached).unwrap();
        let content_info = ContentInfo::from_der(&der).unwrap();
        assert_eq!(content_info.content_type.to_string(), "1.2.840.113549.1.7.2");
        let signed_data = SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap();

        // Detached: the PDF bytes are not embedded
        assert_eq!(signed_data.encap_content_info.econtent_type, ID_DATA);
        assert!(signed_data.encap_content_info.econtent.is_none());
        assert_eq!(signed_data.certificates.as_ref().map(|c| c.0.len()), Some(1));

        let signer_infos: Vec<_> = signed_data.signer_infos.0.iter().collect();
        assert_eq!(signer_infos.len(), 1);
        let signer_info = signer_infos[0];
        assert_eq!(signer_info.digest_alg.oid, ID_SHA_256);

        let signed_attrs = signer_info.signed_attrs.as_ref().unwrap();
        let message_digest = signed_attrs
            .iter()
            .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
            .and_then(|attr| attr.values.iter().next())
            .unwrap();
        let message_digest = OctetString::from_der(&message_digest.to_der().unwrap()).unwrap();
        assert_eq!(message_digest.as_bytes(), Sha256::digest(data).as_slice());

        // The RSA signature covers the DER of the signed attributes
        let signature = Signature::try_from(signer_info.signature.as_bytes()).unwrap();
        VerifyingKey::<Sha256>::new(public)
            .verify(&signed_attrs.to_der().unwrap(), &signature)
            .unwrap();
    }

    #[test]
    fn test_cades_uses_same_structure() {
        let (certificate, key, _) = test_identity();
        let signer = CmsSigner::from_der(&certificate, &key).unwrap();
        let der = signer.sign(b"data", SignatureSubFilter::CadesDetached).unwrap();
        assert!(ContentInfo::from_der(&der).is_ok());
        assert_eq!(signer.certificate().tbs_certificate.serial_number, SerialNumber::new(&[7]).unwrap());
    }

    #[test]
    fn test_rejects_garbage_certificate() {
        let result = CmsSigner::from_der(b"not a certificate", b"not a key");
        assert!(matches!(result, Err(Error::Signing(_))));
    }

    #[test]
    fn test_oids() {
        assert_eq!(ID_DATA.to_string(), "1.2.840.113549.1.7.1");
        assert_eq!(ID_SHA_256.to_string(), "2.16.840.1.101.3.4.2.1");
    }
}
