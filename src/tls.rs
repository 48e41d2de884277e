//! Mutual TLS plumbing (spec §6.2).
//!
//! Trust is not chain-based: both sides present a certificate, neither
//! validates it against a CA, and the caller is expected to pin the peer by
//! fingerprint after the handshake (see [`crate::fingerprint`]). The
//! verifier below always accepts, mirroring the `SkipServerVerification`
//! pattern used for node-to-node links where fingerprint pinning is the
//! real trust boundary.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};
use rustls_pemfile::{certs, pkcs8_private_keys};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::ScampError;

#[derive(Debug)]
struct AcceptAnyCert(Arc<rustls::crypto::CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[derive(Debug)]
struct AcceptAnyClientCert(Arc<rustls::crypto::CryptoProvider>);

impl ClientCertVerifier for AcceptAnyClientCert {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// A loaded certificate + private key pair ready to hand to rustls.
pub struct Identity {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: rustls::pki_types::PrivateKeyDer<'static>,
}

/// Load a PEM certificate chain and PKCS#8 private key from disk.
pub fn load_identity(cert_path: &str, key_path: &str) -> Result<Identity, ScampError> {
    let cert_bytes = std::fs::read(cert_path)?;
    let key_bytes = std::fs::read(key_path)?;

    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut &cert_bytes[..])
        .collect::<Result<_, _>>()
        .map_err(|e| ScampError::Tls(format!("reading certificate at {cert_path}: {e}")))?;
    if cert_chain.is_empty() {
        return Err(ScampError::Tls(format!("no certificates found in {cert_path}")));
    }

    let mut keys = pkcs8_private_keys(&mut &key_bytes[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ScampError::Tls(format!("reading private key at {key_path}: {e}")))?;
    let key = keys
        .pop()
        .ok_or_else(|| ScampError::Tls(format!("no PKCS#8 private key found in {key_path}")))?
        .into();

    Ok(Identity { cert_chain, key })
}

/// Build an [`Identity`] directly from already-decoded DER, bypassing disk
/// I/O entirely. Used by in-process test harnesses that mint ephemeral
/// certificates at runtime.
pub fn identity_from_der(
    cert_chain: Vec<CertificateDer<'static>>,
    key: rustls::pki_types::PrivateKeyDer<'static>,
) -> Identity {
    Identity { cert_chain, key }
}

/// Build a client-side TLS connector that presents `identity` and accepts
/// any server certificate (trust is established afterward by fingerprint).
pub fn client_connector(identity: Identity) -> Result<TlsConnector, ScampError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = Arc::new(AcceptAnyCert(provider));
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(identity.cert_chain, identity.key)
        .map_err(|e| ScampError::Tls(e.to_string()))?;
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Build a server-side TLS acceptor that presents `identity` and demands
/// (but does not chain-validate) a client certificate.
pub fn server_acceptor(identity: Identity) -> Result<TlsAcceptor, ScampError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let client_verifier = Arc::new(AcceptAnyClientCert(provider));
    let config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(client_verifier as Arc<dyn ClientCertVerifier>)
        .with_single_cert(identity.cert_chain, identity.key)
        .map_err(|e| ScampError::Tls(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}
